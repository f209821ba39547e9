pub mod expectations;
pub mod scene;
pub mod shaper;

pub use expectations::{check_pixels, PixelExpectation};
pub use scene::{build_main_scene, prepare_canvas, CANVAS_HEIGHT, CANVAS_WIDTH};
pub use shaper::BlockShaper;

use deferred_canvas::GpuBackend;

/// Creates a GPU backend without a window, or `None` when the machine has
/// no usable adapter (CI runners without a GPU or software rasterizer).
pub fn headless_gpu_backend() -> Option<GpuBackend> {
    futures::executor::block_on(GpuBackend::try_new_headless())
}
