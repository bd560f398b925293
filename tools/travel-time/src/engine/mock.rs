//! Scriptable in-process engine
//!
//! Records every call it receives so tests can assert what reached the
//! engine (request path, point capacity, raw bytes, which handle answered)
//! and can script failures without a native engine.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use travel_time_common::{Error, Result};

use super::{CoordinateColumns, EngineLoader, MatrixEntry, Router, RouteSummary};
use crate::geometry::Point;

/// One call observed by a mock handle
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Load {
        path: PathBuf,
        handle: u64,
    },
    Route {
        handle: u64,
        from: Point,
        to: Point,
        profile: String,
        max_points: usize,
    },
    RouteText {
        handle: u64,
        from: String,
        to: String,
        max_points: usize,
    },
    RouteBinary {
        handle: u64,
        from: Vec<u8>,
        to: Vec<u8>,
        max_points: usize,
    },
    Matrix {
        handle: u64,
        sources: usize,
        destinations: usize,
        capacity: usize,
    },
    Locate {
        handle: u64,
        at: Point,
    },
    RawRequest {
        handle: u64,
        action: String,
    },
    Release {
        handle: u64,
    },
}

#[derive(Debug, Default)]
struct Script {
    failing_paths: HashSet<PathBuf>,
    route_error: Option<String>,
    route_points: Option<Vec<Point>>,
    omitted_pairs: HashSet<(usize, usize)>,
    reported_count: Option<usize>,
    not_ready: bool,
}

#[derive(Debug, Default)]
struct Shared {
    script: Mutex<Script>,
    calls: Mutex<Vec<MockCall>>,
    next_handle: Mutex<u64>,
}

/// Loader for [`MockRouter`] handles. Clones share script and call log.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    shared: Arc<Shared>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loading this path fails with a configuration error
    pub fn fail_path(&self, path: impl Into<PathBuf>) -> &Self {
        self.shared.script.lock().failing_paths.insert(path.into());
        self
    }

    /// Loading this path succeeds again
    pub fn heal_path(&self, path: impl AsRef<Path>) -> &Self {
        self.shared.script.lock().failing_paths.remove(path.as_ref());
        self
    }

    /// Every route call fails with this engine message
    pub fn fail_routes(&self, message: impl Into<String>) -> &Self {
        self.shared.script.lock().route_error = Some(message.into());
        self
    }

    /// Every route answers with this shape instead of `[from, to]`
    pub fn route_points(&self, points: Vec<Point>) -> &Self {
        self.shared.script.lock().route_points = Some(points);
        self
    }

    /// Leave `(source, destination)` out of matrix answers
    pub fn omit_pair(&self, source: usize, destination: usize) -> &Self {
        self.shared
            .script
            .lock()
            .omitted_pairs
            .insert((source, destination));
        self
    }

    /// Report this entry count from matrix calls regardless of what was written
    pub fn report_matrix_count(&self, count: usize) -> &Self {
        self.shared.script.lock().reported_count = Some(count);
        self
    }

    /// Handles report not ready
    pub fn set_ready(&self, ready: bool) -> &Self {
        self.shared.script.lock().not_ready = !ready;
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.shared.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.shared.calls.lock().clear();
    }

    /// Handles constructed so far
    pub fn loads(&self) -> usize {
        self.count(|call| matches!(call, MockCall::Load { .. }))
    }

    /// Handles dropped so far
    pub fn releases(&self) -> usize {
        self.count(|call| matches!(call, MockCall::Release { .. }))
    }

    /// Handles currently alive
    pub fn live_handles(&self) -> usize {
        self.loads() - self.releases()
    }

    fn count(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
        self.shared.calls.lock().iter().filter(|c| predicate(*c)).count()
    }
}

impl EngineLoader for MockEngine {
    type Router = MockRouter;

    fn load(&self, config_path: &Path) -> Result<MockRouter> {
        if self.shared.script.lock().failing_paths.contains(config_path) {
            return Err(Error::Configuration(format!(
                "Failed to load config: {}",
                config_path.display()
            )));
        }

        let handle = {
            let mut next = self.shared.next_handle.lock();
            *next += 1;
            *next
        };
        self.shared.calls.lock().push(MockCall::Load {
            path: config_path.to_path_buf(),
            handle,
        });

        Ok(MockRouter {
            shared: Arc::clone(&self.shared),
            handle,
        })
    }
}

/// Handle produced by [`MockEngine`]
#[derive(Debug)]
pub struct MockRouter {
    shared: Arc<Shared>,
    handle: u64,
}

impl MockRouter {
    pub fn handle(&self) -> u64 {
        self.handle
    }

    fn record(&self, call: MockCall) {
        self.shared.calls.lock().push(call);
    }

    fn answer(&self, from: Point, to: Point, max_points: usize) -> Result<RouteSummary> {
        let script = self.shared.script.lock();
        if let Some(message) = &script.route_error {
            return Err(Error::EngineRequest(message.clone()));
        }

        let mut points = script.route_points.clone().unwrap_or_else(|| vec![from, to]);
        points.truncate(max_points);
        Ok(RouteSummary {
            distance_m: 1000.0,
            duration_s: 60.0,
            points,
        })
    }
}

impl Router for MockRouter {
    fn is_ready(&self) -> bool {
        !self.shared.script.lock().not_ready
    }

    fn route(
        &mut self,
        from: Point,
        to: Point,
        profile: &str,
        max_points: usize,
    ) -> Result<RouteSummary> {
        self.record(MockCall::Route {
            handle: self.handle,
            from,
            to,
            profile: profile.to_string(),
            max_points,
        });
        self.answer(from, to, max_points)
    }

    fn route_text(
        &mut self,
        from: &str,
        to: &str,
        _profile: &str,
        max_points: usize,
    ) -> Result<RouteSummary> {
        self.record(MockCall::RouteText {
            handle: self.handle,
            from: from.to_string(),
            to: to.to_string(),
            max_points,
        });
        self.answer(Point::new(0.0, 0.0), Point::new(0.0, 0.0), max_points)
    }

    fn route_binary(
        &mut self,
        from: &[u8],
        to: &[u8],
        _profile: &str,
        max_points: usize,
    ) -> Result<RouteSummary> {
        self.record(MockCall::RouteBinary {
            handle: self.handle,
            from: from.to_vec(),
            to: to.to_vec(),
            max_points,
        });
        self.answer(Point::new(0.0, 0.0), Point::new(0.0, 0.0), max_points)
    }

    fn matrix(
        &mut self,
        sources: &CoordinateColumns,
        destinations: &CoordinateColumns,
        _profile: &str,
        out: &mut [MatrixEntry],
    ) -> Result<usize> {
        self.record(MockCall::Matrix {
            handle: self.handle,
            sources: sources.len(),
            destinations: destinations.len(),
            capacity: out.len(),
        });

        let script = self.shared.script.lock();
        let pairs = (0..sources.len())
            .flat_map(|i| (0..destinations.len()).map(move |j| (i, j)))
            .filter(|pair| !script.omitted_pairs.contains(pair));

        let mut written = 0;
        for ((i, j), slot) in pairs.zip(out.iter_mut()) {
            *slot = MatrixEntry {
                from_index: i as i32,
                to_index: j as i32,
                distance_m: 100.0 * (i + j + 1) as f64,
                duration_s: 10.0 * (i + j + 1) as f64,
            };
            written += 1;
        }

        Ok(script.reported_count.unwrap_or(written))
    }

    fn locate(&mut self, at: Point, _profile: &str) -> Result<Point> {
        self.record(MockCall::Locate {
            handle: self.handle,
            at,
        });
        Ok(at)
    }

    fn raw_request(&mut self, action: &str, request_json: &str) -> Result<String> {
        self.record(MockCall::RawRequest {
            handle: self.handle,
            action: action.to_string(),
        });
        Ok(json!({ "action": action, "request": request_json }).to_string())
    }
}

impl Drop for MockRouter {
    fn drop(&mut self) {
        self.record(MockCall::Release {
            handle: self.handle,
        });
    }
}
