fn main() {
    // Generates the `shadow!(build)` constants used for the startup version log
    if let Err(err) = shadow_rs::ShadowBuilder::builder().build() {
        println!("cargo:warning=failed to generate build metadata: {err}");
    }
}
