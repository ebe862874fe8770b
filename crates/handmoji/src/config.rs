//! Runtime configuration from environment variables.

use std::{
    env::{self, VarError},
    fmt,
    path::PathBuf,
    time::Duration,
};

use anyhow::{bail, Context};

use crate::{
    camera::{ParamPreference, WebcamOptions},
    image::Resolution,
};

const ENV_VAR_MODEL: &str = "HANDMOJI_MODEL";
const ENV_VAR_PALM_MODEL: &str = "HANDMOJI_PALM_MODEL";
const ENV_VAR_ASSETS: &str = "HANDMOJI_ASSETS";
const ENV_VAR_WEBCAM_NAME: &str = "HANDMOJI_WEBCAM_NAME";
const ENV_VAR_WEBCAM_RESOLUTION: &str = "HANDMOJI_WEBCAM_RESOLUTION";
const ENV_VAR_WEBCAM_FPS: &str = "HANDMOJI_WEBCAM_FPS";
const ENV_VAR_WEBCAM_PREFER: &str = "HANDMOJI_WEBCAM_PREFER";
const ENV_VAR_TICK_MS: &str = "HANDMOJI_TICK_MS";
const ENV_VAR_MIN_SCORE: &str = "HANDMOJI_MIN_SCORE";

const DEFAULT_MODEL: &str = "3rdparty/onnx/hand_landmark_full.onnx";
const DEFAULT_PALM_MODEL: &str = "3rdparty/onnx/palm_detection_full.onnx";
const DEFAULT_ASSETS: &str = "assets";
const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// Default gesture matching strictness, on the 0 to 10 score scale.
pub const DEFAULT_MIN_SCORE: f32 = 8.0;

/// Configuration of the `handmoji` application.
///
/// | Variable | Default | Meaning |
/// |---|---|---|
/// | `HANDMOJI_MODEL` | `3rdparty/onnx/hand_landmark_full.onnx` | hand landmark ONNX model |
/// | `HANDMOJI_PALM_MODEL` | `3rdparty/onnx/palm_detection_full.onnx` | palm detection ONNX model |
/// | `HANDMOJI_ASSETS` | `assets` | directory containing `victory.png` and `thumbs_up.png` |
/// | `HANDMOJI_WEBCAM_NAME` | unset | name of the webcam to open |
/// | `HANDMOJI_WEBCAM_RESOLUTION` | `1280x720` | desired webcam resolution, `WIDTHxHEIGHT` |
/// | `HANDMOJI_WEBCAM_FPS` | `30` | desired webcam frame rate |
/// | `HANDMOJI_WEBCAM_PREFER` | `resolution` | `resolution` or `framerate`, whichever matters more |
/// | `HANDMOJI_TICK_MS` | `10` | frame loop period in milliseconds |
/// | `HANDMOJI_MIN_SCORE` | `8` | minimum gesture score, 0 to 10 |
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub model_path: PathBuf,
    pub palm_model_path: PathBuf,
    pub asset_dir: PathBuf,
    pub webcam_name: Option<String>,
    pub webcam_resolution: Resolution,
    pub webcam_fps: u32,
    pub webcam_prefer: ParamPreference,
    pub tick_interval: Duration,
    pub min_score: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_MODEL.into(),
            palm_model_path: DEFAULT_PALM_MODEL.into(),
            asset_dir: DEFAULT_ASSETS.into(),
            webcam_name: None,
            webcam_resolution: Resolution::RES_720P,
            webcam_fps: 30,
            webcam_prefer: ParamPreference::Resolution,
            tick_interval: DEFAULT_TICK,
            min_score: DEFAULT_MIN_SCORE,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| match env::var(name) {
            Ok(value) => Ok(Some(value)),
            Err(VarError::NotPresent) => Ok(None),
            Err(e @ VarError::NotUnicode(_)) => Err(e),
        })
    }

    /// Builds the configuration from a variable lookup function.
    ///
    /// `lookup` returns `Ok(None)` for variables that are not set.
    pub fn from_lookup<F, E>(mut lookup: F) -> anyhow::Result<Self>
    where
        F: FnMut(&str) -> Result<Option<String>, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut var = |name: &'static str| -> anyhow::Result<Option<String>> {
            let value = lookup(name)
                .with_context(|| format!("invalid value set for `{name}` variable"))?;
            Ok(value.filter(|v| !v.is_empty()))
        };

        let mut config = Self::default();
        if let Some(path) = var(ENV_VAR_MODEL)? {
            config.model_path = path.into();
        }
        if let Some(path) = var(ENV_VAR_PALM_MODEL)? {
            config.palm_model_path = path.into();
        }
        if let Some(dir) = var(ENV_VAR_ASSETS)? {
            config.asset_dir = dir.into();
        }
        config.webcam_name = var(ENV_VAR_WEBCAM_NAME)?;
        if let Some(res) = var(ENV_VAR_WEBCAM_RESOLUTION)? {
            config.webcam_resolution = parse_resolution(&res).with_context(|| {
                format!("invalid value set for `{ENV_VAR_WEBCAM_RESOLUTION}`: '{res}'")
            })?;
        }
        if let Some(fps) = var(ENV_VAR_WEBCAM_FPS)? {
            let fps: u32 = fps
                .trim()
                .parse()
                .with_context(|| format!("invalid value set for `{ENV_VAR_WEBCAM_FPS}`: '{fps}'"))?;
            if fps == 0 {
                bail!("`{ENV_VAR_WEBCAM_FPS}` must be greater than zero");
            }
            config.webcam_fps = fps;
        }
        if let Some(pref) = var(ENV_VAR_WEBCAM_PREFER)? {
            config.webcam_prefer = pref
                .trim()
                .parse()
                .with_context(|| format!("invalid value set for `{ENV_VAR_WEBCAM_PREFER}`"))?;
        }
        if let Some(ms) = var(ENV_VAR_TICK_MS)? {
            let ms: u64 = ms
                .trim()
                .parse()
                .with_context(|| format!("invalid value set for `{ENV_VAR_TICK_MS}`: '{ms}'"))?;
            if ms == 0 {
                bail!("`{ENV_VAR_TICK_MS}` must be greater than zero");
            }
            config.tick_interval = Duration::from_millis(ms);
        }
        if let Some(score) = var(ENV_VAR_MIN_SCORE)? {
            let parsed: f32 = score.trim().parse().with_context(|| {
                format!("invalid value set for `{ENV_VAR_MIN_SCORE}`: '{score}'")
            })?;
            if !(0.0..=10.0).contains(&parsed) {
                bail!("`{ENV_VAR_MIN_SCORE}` must be between 0 and 10, got {parsed}");
            }
            config.min_score = parsed;
        }

        Ok(config)
    }

    /// Returns the options to open the webcam with.
    pub fn webcam_options(&self) -> WebcamOptions {
        let mut options = WebcamOptions::default()
            .resolution(self.webcam_resolution)
            .fps(self.webcam_fps)
            .prefer(self.webcam_prefer);
        if let Some(name) = &self.webcam_name {
            options = options.name(name);
        }
        options
    }
}

fn parse_resolution(s: &str) -> anyhow::Result<Resolution> {
    let Some((w, h)) = s.trim().split_once('x') else {
        bail!("expected WIDTHxHEIGHT");
    };
    let (w, h): (u32, u32) = (w.parse()?, h.parse()?);
    if w == 0 || h == 0 {
        bail!("resolution must not be empty");
    }
    Ok(Resolution::new(w, h))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model={}, palm_model={}, assets={}, webcam={} ({} @ {} FPS, prefer {:?}), tick={:?}, min_score={}",
            self.model_path.display(),
            self.palm_model_path.display(),
            self.asset_dir.display(),
            self.webcam_name.as_deref().unwrap_or("<any>"),
            self.webcam_resolution,
            self.webcam_fps,
            self.webcam_prefer,
            self.tick_interval,
            self.min_score,
        )
    }
}
