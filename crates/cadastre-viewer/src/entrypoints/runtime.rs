//! Fire-and-forget task spawning
//!
//! Native builds run tasks on the tokio runtime that `main` starts. In the
//! browser they run on the JavaScript event loop, where `reqwest` futures are
//! not `Send`.

use std::future::Future;

#[cfg(not(target_arch = "wasm32"))]
pub fn spawn<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    #[cfg(feature = "profiling")]
    {
        tokio::spawn(async move {
            profiling::scope!("runtime::spawn");
            future.await
        });
    }
    #[cfg(not(feature = "profiling"))]
    {
        tokio::spawn(future);
    }
}

#[cfg(target_arch = "wasm32")]
pub fn spawn<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}
