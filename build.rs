//! Build script for vix-bridge crate.
//!
//! Links against the VIX SDK shared library when the `native` feature is on.
//! Without it the crate only carries the in-process simulator and links nothing.

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=VIX_LIB_DIR");
    println!("cargo:rerun-if-changed=build.rs");

    if env::var_os("CARGO_FEATURE_NATIVE").is_none() {
        return;
    }

    let target = env::var("TARGET").unwrap_or_default();

    match find_lib_dir(&target) {
        Some(dir) => println!("cargo:rustc-link-search=native={}", dir.display()),
        None => println!(
            "cargo:warning=VIX SDK not found; set VIX_LIB_DIR to the directory holding the library"
        ),
    }

    // The SDK ships a dynamic import library on Windows and a plain shared object elsewhere.
    if target.contains("windows") {
        println!("cargo:rustc-link-lib=dylib=Vix64AllProductsDyn");
    } else {
        println!("cargo:rustc-link-lib=dylib=vixAllProducts");
    }

    // On Linux the SDK pulls in libdl and pthreads.
    if target.contains("linux") {
        println!("cargo:rustc-link-lib=pthread");
        println!("cargo:rustc-link-lib=dl");
    }
}

/// Locate the directory holding the VIX library.
///
/// `VIX_LIB_DIR` wins; otherwise the default install locations of the SDK are probed.
fn find_lib_dir(target: &str) -> Option<PathBuf> {
    if let Some(dir) = env::var_os("VIX_LIB_DIR") {
        return Some(PathBuf::from(dir));
    }

    let candidates: &[&str] = if target.contains("windows") {
        &[
            "C:\\Program Files (x86)\\VMware\\VMware VIX",
            "C:\\Program Files\\VMware\\VMware VIX",
        ]
    } else if target.contains("apple") {
        &["/Applications/VMware Fusion.app/Contents/Public"]
    } else {
        &["/usr/lib/vmware-vix", "/usr/lib", "/usr/local/lib"]
    };

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|dir| dir.exists())
}
