//! Native engine binding over `libvalhalla_wrapper`
//!
//! The wrapper exposes a plain C ABI around the routing engine. Strings
//! returned by `valhalla_request` are owned by the wrapper and must go back
//! through `valhalla_free_string`; `valhalla_last_error` and
//! `valhalla_version` point at static storage and must not be freed.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_uchar};
use std::path::Path;
use std::ptr::NonNull;

use travel_time_common::{Error, Result};

use super::{CoordinateColumns, EngineLoader, MatrixEntry, Router, RouteSummary};
use crate::geometry::Point;

#[repr(C)]
struct RawRouter {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Default)]
struct RawRouteResult {
    distance_m: f64,
    duration_s: f64,
    num_points: c_int,
}

#[repr(C)]
#[derive(Default, Clone, Copy)]
struct RawPoint {
    lat: f64,
    lon: f64,
}

extern "C" {
    fn valhalla_init(config_path: *const c_char) -> *mut RawRouter;
    fn valhalla_is_ready(router: *mut RawRouter) -> c_int;
    fn valhalla_route(
        router: *mut RawRouter,
        lat1: f64,
        lon1: f64,
        lat2: f64,
        lon2: f64,
        costing: *const c_char,
        out_result: *mut RawRouteResult,
        out_points: *mut RawPoint,
        max_points: c_int,
    ) -> c_int;
    fn valhalla_route_wkt(
        router: *mut RawRouter,
        from_wkt: *const c_char,
        to_wkt: *const c_char,
        costing: *const c_char,
        out_result: *mut RawRouteResult,
        out_points: *mut RawPoint,
        max_points: c_int,
    ) -> c_int;
    fn valhalla_route_wkb(
        router: *mut RawRouter,
        from_wkb: *const c_uchar,
        from_wkb_len: c_int,
        to_wkb: *const c_uchar,
        to_wkb_len: c_int,
        costing: *const c_char,
        out_result: *mut RawRouteResult,
        out_points: *mut RawPoint,
        max_points: c_int,
    ) -> c_int;
    fn valhalla_matrix(
        router: *mut RawRouter,
        src_lats: *const f64,
        src_lons: *const f64,
        src_count: c_int,
        dst_lats: *const f64,
        dst_lons: *const f64,
        dst_count: c_int,
        costing: *const c_char,
        out_entries: *mut MatrixEntry,
    ) -> c_int;
    fn valhalla_locate(
        router: *mut RawRouter,
        lat: f64,
        lon: f64,
        costing: *const c_char,
        out_lat: *mut f64,
        out_lon: *mut f64,
    ) -> c_int;
    fn valhalla_request(
        router: *mut RawRouter,
        action: *const c_char,
        request_json: *const c_char,
    ) -> *mut c_char;
    fn valhalla_free_string(s: *mut c_char);
    fn valhalla_last_error() -> *const c_char;
    fn valhalla_free(router: *mut RawRouter);
    fn valhalla_version() -> *const c_char;
}

/// Copy a static, wrapper-owned C string
fn static_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null pointers from the wrapper are NUL-terminated static strings
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

fn last_error() -> String {
    // SAFETY: no preconditions
    static_string(unsafe { valhalla_last_error() })
        .filter(|msg| !msg.is_empty())
        .unwrap_or_else(|| "Unknown routing engine error".to_string())
}

/// Wrapper library version string
pub fn version() -> String {
    // SAFETY: no preconditions
    static_string(unsafe { valhalla_version() }).unwrap_or_else(|| "unknown".to_string())
}

fn c_string(value: &str, what: &str) -> Result<CString> {
    CString::new(value)
        .map_err(|_| Error::EngineRequest(format!("{what} contains an interior NUL byte")))
}

fn c_len(len: usize, what: &str) -> Result<c_int> {
    c_int::try_from(len).map_err(|_| Error::InvalidInput(format!("{what} too large: {len}")))
}

/// Loader for [`ValhallaRouter`] handles
#[derive(Debug, Clone, Copy, Default)]
pub struct ValhallaEngine;

impl EngineLoader for ValhallaEngine {
    type Router = ValhallaRouter;

    fn load(&self, config_path: &Path) -> Result<ValhallaRouter> {
        let path = config_path.to_str().ok_or_else(|| {
            Error::Configuration(format!(
                "Config path is not valid UTF-8: {}",
                config_path.display()
            ))
        })?;
        let c_path = CString::new(path)
            .map_err(|_| Error::Configuration("Config path contains a NUL byte".to_string()))?;

        // SAFETY: c_path outlives the call
        let raw = unsafe { valhalla_init(c_path.as_ptr()) };
        let handle = NonNull::new(raw).ok_or_else(|| {
            Error::Configuration(format!("Failed to load config: {}", last_error()))
        })?;

        tracing::debug!(path, version = %version(), "Native routing engine initialised");
        Ok(ValhallaRouter { handle })
    }
}

/// Exclusively owned native router handle, freed on drop
pub struct ValhallaRouter {
    handle: NonNull<RawRouter>,
}

// SAFETY: the handle is only used through &mut self, never concurrently
unsafe impl Send for ValhallaRouter {}

impl ValhallaRouter {
    fn summary(&self, result: RawRouteResult, written: c_int, points: &[RawPoint]) -> Result<RouteSummary> {
        if written < 0 {
            return Err(Error::EngineRequest(last_error()));
        }
        let count = (written as usize).min(points.len());
        Ok(RouteSummary {
            distance_m: result.distance_m,
            duration_s: result.duration_s,
            points: points[..count]
                .iter()
                .map(|p| Point::new(p.lon, p.lat))
                .collect(),
        })
    }
}

impl Router for ValhallaRouter {
    fn is_ready(&self) -> bool {
        // SAFETY: handle is live until drop
        unsafe { valhalla_is_ready(self.handle.as_ptr()) == 1 }
    }

    fn route(
        &mut self,
        from: Point,
        to: Point,
        profile: &str,
        max_points: usize,
    ) -> Result<RouteSummary> {
        let costing = c_string(profile, "Costing")?;
        let capacity = c_len(max_points, "Point buffer")?;
        let mut result = RawRouteResult::default();
        let mut points = vec![RawPoint::default(); max_points];

        // SAFETY: every buffer outlives the call and `points` holds `capacity` slots
        let written = unsafe {
            valhalla_route(
                self.handle.as_ptr(),
                from.lat,
                from.lon,
                to.lat,
                to.lon,
                costing.as_ptr(),
                &mut result,
                points.as_mut_ptr(),
                capacity,
            )
        };
        self.summary(result, written, &points)
    }

    fn route_text(
        &mut self,
        from: &str,
        to: &str,
        profile: &str,
        max_points: usize,
    ) -> Result<RouteSummary> {
        let from = c_string(from, "From geometry")?;
        let to = c_string(to, "To geometry")?;
        let costing = c_string(profile, "Costing")?;
        let capacity = c_len(max_points, "Point buffer")?;
        let mut result = RawRouteResult::default();
        let mut points = vec![RawPoint::default(); max_points];

        // SAFETY: as in `route`
        let written = unsafe {
            valhalla_route_wkt(
                self.handle.as_ptr(),
                from.as_ptr(),
                to.as_ptr(),
                costing.as_ptr(),
                &mut result,
                points.as_mut_ptr(),
                capacity,
            )
        };
        self.summary(result, written, &points)
    }

    fn route_binary(
        &mut self,
        from: &[u8],
        to: &[u8],
        profile: &str,
        max_points: usize,
    ) -> Result<RouteSummary> {
        let costing = c_string(profile, "Costing")?;
        let capacity = c_len(max_points, "Point buffer")?;
        let from_len = c_len(from.len(), "From geometry")?;
        let to_len = c_len(to.len(), "To geometry")?;
        let mut result = RawRouteResult::default();
        let mut points = vec![RawPoint::default(); max_points];

        // SAFETY: slices are valid for their stated lengths for the whole call
        let written = unsafe {
            valhalla_route_wkb(
                self.handle.as_ptr(),
                from.as_ptr(),
                from_len,
                to.as_ptr(),
                to_len,
                costing.as_ptr(),
                &mut result,
                points.as_mut_ptr(),
                capacity,
            )
        };
        self.summary(result, written, &points)
    }

    fn matrix(
        &mut self,
        sources: &CoordinateColumns,
        destinations: &CoordinateColumns,
        profile: &str,
        out: &mut [MatrixEntry],
    ) -> Result<usize> {
        let needed = sources.len() * destinations.len();
        if out.len() < needed {
            return Err(Error::EngineRequest(format!(
                "Matrix output buffer holds {} entries, {needed} required",
                out.len()
            )));
        }
        let costing = c_string(profile, "Costing")?;
        let src_count = c_len(sources.len(), "Source count")?;
        let dst_count = c_len(destinations.len(), "Destination count")?;

        // SAFETY: `out` holds at least src_count * dst_count entries and
        // MatrixEntry is layout-compatible with the wrapper's entry struct
        let written = unsafe {
            valhalla_matrix(
                self.handle.as_ptr(),
                sources.lats().as_ptr(),
                sources.lons().as_ptr(),
                src_count,
                destinations.lats().as_ptr(),
                destinations.lons().as_ptr(),
                dst_count,
                costing.as_ptr(),
                out.as_mut_ptr(),
            )
        };
        usize::try_from(written).map_err(|_| Error::EngineRequest(last_error()))
    }

    fn locate(&mut self, at: Point, profile: &str) -> Result<Point> {
        let costing = c_string(profile, "Costing")?;
        let (mut lat, mut lon) = (0.0, 0.0);

        // SAFETY: out pointers reference live locals
        let code = unsafe {
            valhalla_locate(
                self.handle.as_ptr(),
                at.lat,
                at.lon,
                costing.as_ptr(),
                &mut lat,
                &mut lon,
            )
        };
        if code < 0 {
            return Err(Error::EngineRequest(last_error()));
        }
        Ok(Point::new(lon, lat))
    }

    fn raw_request(&mut self, action: &str, request_json: &str) -> Result<String> {
        let action = c_string(action, "Action")?;
        let request = c_string(request_json, "Request JSON")?;

        // SAFETY: arguments outlive the call
        let response = unsafe {
            valhalla_request(self.handle.as_ptr(), action.as_ptr(), request.as_ptr())
        };
        if response.is_null() {
            return Err(Error::EngineRequest(last_error()));
        }

        // SAFETY: non-null response is a NUL-terminated string we now own
        let text = unsafe { CStr::from_ptr(response) }
            .to_string_lossy()
            .into_owned();
        // SAFETY: returned exactly once to the allocator that produced it
        unsafe { valhalla_free_string(response) };
        Ok(text)
    }
}

impl Drop for ValhallaRouter {
    fn drop(&mut self) {
        // SAFETY: handle came from valhalla_init and is freed exactly once
        unsafe { valhalla_free(self.handle.as_ptr()) };
    }
}
