use handmoji::{
    camera::LiveCamera,
    config::Config,
    controller::FrameLoop,
    detector::{DetectorLoader, HandLandmarker},
    gui,
    overlay::OverlayAssets,
    surface::Canvas,
};
use handmoji_gesture::GestureEstimator;

const WINDOW_TITLE: &str = "handmoji";

fn main() {
    handmoji::init_logger!();
    gui::run(app);
}

fn app() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    log::info!("configuration: {config}");

    let camera = LiveCamera::start(config.webcam_options())?;

    let model_path = config.model_path.clone();
    let palm_model_path = config.palm_model_path.clone();
    let loader =
        DetectorLoader::spawn(move || HandLandmarker::load(model_path, palm_model_path));

    let assets = OverlayAssets::load(&config.asset_dir);
    let canvas = Canvas::new(assets, |image| gui::show_image(WINDOW_TITLE, &image));

    let mut frame_loop = FrameLoop::new(camera, loader, GestureEstimator::builtin(), canvas);
    frame_loop.set_min_score(config.min_score);
    frame_loop.set_tick_interval(config.tick_interval);

    let handle = frame_loop.dispose_handle();
    gui::on_close(move || {
        handle.dispose();
    })?;

    frame_loop.run();
    Ok(())
}
