use std::env;

#[cfg(target_os = "macos")]
fn find_dependencies() {
    println!("cargo::rustc-link-arg-bin=chip8_frontend=-lSDL2 -L$HOMEBREW_CELLAR")
}

#[cfg(target_os = "windows")]
fn find_dependencies() {
}

#[cfg(target_os = "linux")]
fn find_dependencies() {
    if let Err(e) = pkg_config::Config::new().probe("sdl2") {
        println!("cargo::warning=pkg-config could not locate SDL2: {e}");
    }
}

fn main() {
    println!("cargo::rerun-if-changed=build.rs");
    // Only the frontend binary links against SDL2
    if env::var_os("CARGO_FEATURE_FRONTEND").is_some() {
        find_dependencies();
    }
}
