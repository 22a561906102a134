//! Interpreter and layout settings.
//!
//! Defaults live in [`defaults`]; a session can override any numeric setting
//! with `default.NAME.VALUE` or through [`Settings::set`].

use crate::types::{Angle, Length, NumericError, Scaler};

/// Default sizes and settings (world units are TikZ centimetres)
pub mod defaults {
    use crate::types::Length;

    pub const NODE_DISTANCE: Length = Length::units(1.0);
    pub const INNER_SEP: Length = Length::units(0.1);
    pub const MIN_WIDTH: Length = Length::units(0.0);
    pub const MIN_HEIGHT: Length = Length::units(0.0);
    pub const CHAR_WIDTH: f64 = 0.16;
    pub const CHAR_HEIGHT: f64 = 0.35;
    pub const CURVE_STEP: f64 = 0.01;
    pub const MIN_CURVE_STEPS: usize = 20;
    pub const DEVICE_SCALE: f64 = 50.0;
    /// Stroke width in points.
    pub const LINE_WIDTH: f64 = 0.4;
    pub const THICK: f64 = 0.8;
    pub const VERY_THICK: f64 = 1.2;
    /// TikZ's 4pt, in centimetres.
    pub const ROUNDED_CORNERS: f64 = 0.14;
    pub const CURVE_OUT: f64 = 30.0;
    pub const CURVE_IN: f64 = 150.0;
    /// Squared-length cutoff for silhouette bisection.
    pub const BISECT_TOLERANCE: f64 = 0.001;
    /// Most objects one batch or generator command may create.
    pub const MAX_OBJECTS: usize = 10_000;
    /// Most samples one curve may take.
    pub const MAX_CURVE_STEPS: usize = 10_000;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub node_distance: Length,
    pub inner_sep: Length,
    pub min_width: Length,
    pub min_height: Length,
    pub char_width: f64,
    pub char_height: f64,
    pub curve_step: f64,
    pub min_curve_steps: usize,
    pub device_scale: f64,
    pub line_width: f64,
    pub curve_out: Angle,
    pub curve_in: Angle,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            node_distance: defaults::NODE_DISTANCE,
            inner_sep: defaults::INNER_SEP,
            min_width: defaults::MIN_WIDTH,
            min_height: defaults::MIN_HEIGHT,
            char_width: defaults::CHAR_WIDTH,
            char_height: defaults::CHAR_HEIGHT,
            curve_step: defaults::CURVE_STEP,
            min_curve_steps: defaults::MIN_CURVE_STEPS,
            device_scale: defaults::DEVICE_SCALE,
            line_width: defaults::LINE_WIDTH,
            curve_out: Angle(defaults::CURVE_OUT),
            curve_in: Angle(defaults::CURVE_IN),
        }
    }
}

/// Why a setting could not be changed.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingError {
    Unknown(String),
    Invalid(NumericError),
    TooLarge { max: usize },
}

impl From<NumericError> for SettingError {
    fn from(err: NumericError) -> Self {
        SettingError::Invalid(err)
    }
}

impl Settings {
    /// Names accepted by [`Settings::set`].
    pub const NAMES: &'static [&'static str] = &[
        "node_distance",
        "inner_sep",
        "min_width",
        "min_height",
        "char_width",
        "char_height",
        "curve_step",
        "min_curve_steps",
        "device_scale",
        "line_width",
        "curve_out",
        "curve_in",
    ];

    /// Override one numeric setting by name.
    pub fn set(&mut self, name: &str, value: f64) -> Result<(), SettingError> {
        match name {
            "node_distance" => self.node_distance = Length::try_non_negative(value)?,
            "inner_sep" => self.inner_sep = Length::try_non_negative(value)?,
            "min_width" => self.min_width = Length::try_non_negative(value)?,
            "min_height" => self.min_height = Length::try_non_negative(value)?,
            "char_width" => self.char_width = Length::try_positive(value)?.raw(),
            "char_height" => self.char_height = Length::try_positive(value)?.raw(),
            "curve_step" => self.curve_step = Length::try_positive(value)?.raw(),
            "min_curve_steps" => {
                let steps = Length::try_positive(value)?.raw().ceil();
                if steps > defaults::MAX_CURVE_STEPS as f64 {
                    return Err(SettingError::TooLarge {
                        max: defaults::MAX_CURVE_STEPS,
                    });
                }
                self.min_curve_steps = steps as usize;
            }
            "device_scale" => self.device_scale = Scaler::try_new(value)?.scale,
            "line_width" => self.line_width = Length::try_non_negative(value)?.raw(),
            "curve_out" => self.curve_out = Angle::try_new(value)?,
            "curve_in" => self.curve_in = Angle::try_new(value)?,
            other => return Err(SettingError::Unknown(other.to_string())),
        }
        Ok(())
    }

    pub fn scaler(&self) -> Scaler {
        Scaler {
            scale: self.device_scale,
            origin: glam::DVec2::ZERO,
        }
    }
}
