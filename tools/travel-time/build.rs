use std::env;

fn main() {
    // Link the native engine wrapper only when the binding is compiled in
    if env::var_os("CARGO_FEATURE_VALHALLA").is_some() {
        if let Ok(dir) = env::var("VALHALLA_WRAPPER_LIB_DIR") {
            println!("cargo:rustc-link-search=native={}", dir);
        }
        println!("cargo:rustc-link-lib=dylib=valhalla_wrapper");
    }

    println!("cargo:rerun-if-env-changed=VALHALLA_WRAPPER_LIB_DIR");
    println!("cargo:rerun-if-changed=build.rs");
}
