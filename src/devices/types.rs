//! Device kinds, settings and readings

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Device settings that could not be built from user input
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("Unknown device: {0}")]
    UnknownKind(String),

    #[error("Invalid value for {kind}: {value}")]
    InvalidValue { kind: DeviceKind, value: String },
}

/// One of the therapy devices exposed under `/device-controls`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Sound,
    Steam,
    TempTank,
    WaterPump,
    NanoFlicker,
    LedColor,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 6] = [
        DeviceKind::Sound,
        DeviceKind::LedColor,
        DeviceKind::Steam,
        DeviceKind::NanoFlicker,
        DeviceKind::TempTank,
        DeviceKind::WaterPump,
    ];

    /// JSON field holding the device value in requests and history records
    pub fn value_field(self) -> &'static str {
        match self {
            DeviceKind::Sound => "sound",
            DeviceKind::Steam => "steam",
            DeviceKind::TempTank => "temp_tank",
            DeviceKind::WaterPump => "water_pump",
            DeviceKind::NanoFlicker => "nano_flicker",
            DeviceKind::LedColor => "led_color",
        }
    }

    /// URL segment under `/device-controls`
    pub fn path_segment(self) -> &'static str {
        match self {
            DeviceKind::Sound => "sound",
            DeviceKind::Steam => "steam",
            DeviceKind::TempTank => "temp-tank",
            DeviceKind::WaterPump => "water-pump",
            DeviceKind::NanoFlicker => "nano-flicker",
            DeviceKind::LedColor => "led-color",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            DeviceKind::Sound => "Sound System",
            DeviceKind::Steam => "Steam Generator",
            DeviceKind::TempTank => "Temperature Tank",
            DeviceKind::WaterPump => "Water Pump",
            DeviceKind::NanoFlicker => "Nanoflicker",
            DeviceKind::LedColor => "LED Light Therapy",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

impl FromStr for DeviceKind {
    type Err = DeviceError;

    /// Accepts both `temp-tank` and `temp_tank`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        DeviceKind::ALL
            .into_iter()
            .find(|kind| kind.path_segment() == normalized)
            .ok_or_else(|| DeviceError::UnknownKind(s.to_string()))
    }
}

/// Colours the LED controller understands
pub const LED_COLORS: [&str; 6] = ["red", "green", "blue", "purple", "yellow", "white"];

/// A value to send to one device
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceSetting {
    Sound(bool),
    Steam(bool),
    TempTank(f64),
    WaterPump(bool),
    NanoFlicker(bool),
    LedColor(String),
}

impl DeviceSetting {
    pub fn kind(&self) -> DeviceKind {
        match self {
            DeviceSetting::Sound(_) => DeviceKind::Sound,
            DeviceSetting::Steam(_) => DeviceKind::Steam,
            DeviceSetting::TempTank(_) => DeviceKind::TempTank,
            DeviceSetting::WaterPump(_) => DeviceKind::WaterPump,
            DeviceSetting::NanoFlicker(_) => DeviceKind::NanoFlicker,
            DeviceSetting::LedColor(_) => DeviceKind::LedColor,
        }
    }

    pub fn value(&self) -> Value {
        match self {
            DeviceSetting::Sound(on)
            | DeviceSetting::Steam(on)
            | DeviceSetting::WaterPump(on)
            | DeviceSetting::NanoFlicker(on) => Value::Bool(*on),
            DeviceSetting::TempTank(temp) => json!(temp),
            DeviceSetting::LedColor(color) => Value::String(color.clone()),
        }
    }

    /// Request body: `{ "<value_field>": value }`
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert(self.kind().value_field().to_string(), self.value());
        Value::Object(body)
    }

    /// Build a setting from command-line text
    ///
    /// Switches take `on`/`off`/`true`/`false`/`1`/`0`, the tank takes a
    /// number and the LED takes one of [`LED_COLORS`].
    pub fn parse(kind: DeviceKind, raw: &str) -> Result<Self, DeviceError> {
        let invalid = || DeviceError::InvalidValue {
            kind,
            value: raw.to_string(),
        };
        let input = raw.trim().to_ascii_lowercase();

        let switch = || match input.as_str() {
            "on" | "true" | "1" => Ok(true),
            "off" | "false" | "0" => Ok(false),
            _ => Err(invalid()),
        };

        Ok(match kind {
            DeviceKind::Sound => DeviceSetting::Sound(switch()?),
            DeviceKind::Steam => DeviceSetting::Steam(switch()?),
            DeviceKind::WaterPump => DeviceSetting::WaterPump(switch()?),
            DeviceKind::NanoFlicker => DeviceSetting::NanoFlicker(switch()?),
            DeviceKind::TempTank => {
                let temp: f64 = input.parse().map_err(|_| invalid())?;
                if !temp.is_finite() {
                    return Err(invalid());
                }
                DeviceSetting::TempTank(temp)
            }
            DeviceKind::LedColor => {
                if !LED_COLORS.contains(&input.as_str()) {
                    return Err(invalid());
                }
                DeviceSetting::LedColor(input)
            }
        })
    }
}

/// One stored device record: the value field plus server metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceRecord(pub Map<String, Value>);

impl DeviceRecord {
    pub fn value(&self, kind: DeviceKind) -> Option<&Value> {
        self.0.get(kind.value_field())
    }

    pub fn created_at(&self) -> Option<&str> {
        self.0.get("created_at").and_then(Value::as_str)
    }
}

/// Latest record per device, as returned by `/device-controls/latest`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceStates {
    #[serde(default)]
    pub sound: Option<DeviceRecord>,
    #[serde(default)]
    pub steam: Option<DeviceRecord>,
    #[serde(default)]
    pub temp_tank: Option<DeviceRecord>,
    #[serde(default)]
    pub water_pump: Option<DeviceRecord>,
    #[serde(default)]
    pub nano_flicker: Option<DeviceRecord>,
    #[serde(default)]
    pub led_color: Option<DeviceRecord>,
}

impl DeviceStates {
    pub fn record(&self, kind: DeviceKind) -> Option<&DeviceRecord> {
        match kind {
            DeviceKind::Sound => self.sound.as_ref(),
            DeviceKind::Steam => self.steam.as_ref(),
            DeviceKind::TempTank => self.temp_tank.as_ref(),
            DeviceKind::WaterPump => self.water_pump.as_ref(),
            DeviceKind::NanoFlicker => self.nano_flicker.as_ref(),
            DeviceKind::LedColor => self.led_color.as_ref(),
        }
    }

    /// Latest value of one device, if it has ever been set
    pub fn value(&self, kind: DeviceKind) -> Option<&Value> {
        self.record(kind).and_then(|r| r.value(kind))
    }
}
