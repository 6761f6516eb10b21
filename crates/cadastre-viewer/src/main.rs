#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

#[cfg(not(target_arch = "wasm32"))]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(cadastre_viewer::native_main())?;
    Ok(())
}

// The browser build starts from `WebHandle` instead
#[cfg(target_arch = "wasm32")]
fn main() {}
