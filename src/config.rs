//! JSON description of a residual block.
//!
//! ```json
//! {
//!   "modules":   [{"type": "linear", "in_features": 12, "out_features": 8}, {"type": "relu"}],
//!   "shortcuts": [{"from": 0, "to": 3, "projection": {"type": "linear", "in_features": 12, "out_features": 8}}],
//!   "scales":    [{"slot": 3, "factor": 0.5}]
//! }
//! ```
//!
//! Building adds every module first, then the shortcuts and the scales in file
//! order, so all indices are checked against the final module count.

use crate::nn::{
    BatchNorm, Conv2d, Conv2dConfig, LayerNorm, LeakyReLU, Linear, Module, ReLU, Residual, ResidualError,
    Sequential, SiLU, Sigmoid, Tanh, ELU, GELU,
};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid residual topology: {0}")]
    Residual(#[from] ResidualError),

    #[error("Invalid layer config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

fn default_true() -> bool {
    true
}

fn default_feature_axis() -> usize {
    1
}

fn default_eps() -> f32 {
    1e-5
}

fn default_negative_slope() -> f32 {
    0.01
}

fn default_alpha() -> f32 {
    1.0
}

/// One module, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerConfig {
    Linear {
        in_features: usize,
        out_features: usize,
        #[serde(default = "default_true")]
        bias: bool,
    },
    Conv2d(Conv2dConfig),
    BatchNorm {
        num_features: usize,
        #[serde(default = "default_feature_axis")]
        feature_axis: usize,
        #[serde(default = "default_eps")]
        eps: f32,
    },
    LayerNorm {
        normalized_size: usize,
        #[serde(default = "default_eps")]
        eps: f32,
    },
    #[serde(rename = "relu")]
    ReLU,
    #[serde(rename = "leaky_relu")]
    LeakyReLU {
        #[serde(default = "default_negative_slope")]
        negative_slope: f32,
    },
    #[serde(rename = "elu")]
    ELU {
        #[serde(default = "default_alpha")]
        alpha: f32,
    },
    Sigmoid,
    Tanh,
    #[serde(rename = "gelu")]
    GELU,
    #[serde(rename = "silu")]
    SiLU,
    Sequential {
        modules: Vec<LayerConfig>,
    },
    Residual(ResidualConfig),
}

impl LayerConfig {
    /// Instantiates the module, drawing any random parameters from `rng`.
    pub fn build(&self, rng: &mut StdRng) -> ConfigResult<Box<dyn Module>> {
        let module: Box<dyn Module> = match self {
            LayerConfig::Linear {
                in_features,
                out_features,
                bias,
            } => {
                if *in_features == 0 || *out_features == 0 {
                    return Err(ConfigError::Invalid(format!(
                        "linear layer needs positive sizes, got {} -> {}",
                        in_features, out_features
                    )));
                }
                let linear = Linear::new(*in_features, *out_features, rng);
                Box::new(if *bias { linear } else { linear.without_bias() })
            }
            LayerConfig::Conv2d(config) => {
                if config.groups == 0
                    || config.in_channels % config.groups != 0
                    || config.out_channels % config.groups != 0
                {
                    return Err(ConfigError::Invalid(format!(
                        "conv2d channels {} -> {} cannot be split into {} groups",
                        config.in_channels, config.out_channels, config.groups
                    )));
                }
                Box::new(Conv2d::new(config.clone(), rng))
            }
            LayerConfig::BatchNorm {
                num_features,
                feature_axis,
                eps,
            } => Box::new(
                BatchNorm::new(*num_features)
                    .with_feature_axis(*feature_axis)
                    .with_eps(*eps),
            ),
            LayerConfig::LayerNorm { normalized_size, eps } => {
                Box::new(LayerNorm::new(*normalized_size).with_eps(*eps))
            }
            LayerConfig::ReLU => Box::new(ReLU),
            LayerConfig::LeakyReLU { negative_slope } => Box::new(LeakyReLU::new(*negative_slope)),
            LayerConfig::ELU { alpha } => Box::new(ELU::new(*alpha)),
            LayerConfig::Sigmoid => Box::new(Sigmoid),
            LayerConfig::Tanh => Box::new(Tanh),
            LayerConfig::GELU => Box::new(GELU),
            LayerConfig::SiLU => Box::new(SiLU),
            LayerConfig::Sequential { modules } => {
                let mut sequential = Sequential::new();
                for layer in modules {
                    sequential.push(layer.build(rng)?);
                }
                Box::new(sequential)
            }
            LayerConfig::Residual(config) => Box::new(config.build(rng)?),
        };
        Ok(module)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortcutConfig {
    pub from: usize,
    pub to: usize,
    #[serde(default)]
    pub projection: Option<LayerConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleConfig {
    pub slot: usize,
    pub factor: f32,
}

/// Complete description of one residual block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResidualConfig {
    pub modules: Vec<LayerConfig>,
    #[serde(default)]
    pub shortcuts: Vec<ShortcutConfig>,
    #[serde(default)]
    pub scales: Vec<ScaleConfig>,
}

impl ResidualConfig {
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builds and freezes the block.
    pub fn build(&self, rng: &mut StdRng) -> ConfigResult<Residual> {
        let mut builder = Residual::builder();
        for layer in &self.modules {
            builder.add_boxed(layer.build(rng)?);
        }
        for shortcut in &self.shortcuts {
            let projection = shortcut
                .projection
                .as_ref()
                .map(|layer| layer.build(rng))
                .transpose()?;
            builder.add_boxed_shortcut(shortcut.from, shortcut.to, projection)?;
        }
        for scale in &self.scales {
            builder.add_scale(scale.slot, scale.factor)?;
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;
    use rand::SeedableRng;

    const PROJECTED_BLOCK: &str = r#"{
        "modules": [
            {"type": "linear", "in_features": 12, "out_features": 8},
            {"type": "relu"},
            {"type": "linear", "in_features": 8, "out_features": 4},
            {"type": "relu"},
            {"type": "linear", "in_features": 4, "out_features": 4},
            {"type": "relu"}
        ],
        "shortcuts": [
            {"from": 1, "to": 4, "projection": {"type": "linear", "in_features": 8, "out_features": 4}},
            {"from": 0, "to": 5, "projection": {"type": "linear", "in_features": 12, "out_features": 4}},
            {"from": 5, "to": 7}
        ],
        "scales": [
            {"slot": 3, "factor": 0.3},
            {"slot": 4, "factor": 0.24},
            {"slot": 5, "factor": 0.5}
        ]
    }"#;

    #[test]
    fn test_build_projected_block_from_json() {
        let config = ResidualConfig::from_json_str(PROJECTED_BLOCK).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let block = config.build(&mut rng).unwrap();

        assert_eq!(block.num_modules(), 6);
        assert_eq!(block.shortcuts().len(), 3);
        assert_eq!(block.scale(4), Some(0.24));
        // 3 linears + 2 projections, each with weights and bias.
        assert_eq!(block.parameters().len(), 10);

        let x = Tensor::random_uniform(&[2, 12], 0.0, 1.0, &mut rng);
        assert_eq!(block.forward(&x).unwrap().shape(), &[2, 4]);
    }

    #[test]
    fn test_same_seed_builds_identical_blocks() {
        let config = ResidualConfig::from_json_str(PROJECTED_BLOCK).unwrap();
        let a = config.build(&mut StdRng::seed_from_u64(9)).unwrap();
        let b = config.build(&mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a.parameters(), b.parameters());
    }

    #[test]
    fn test_nested_containers_and_defaults() {
        let json = r#"{
            "modules": [
                {"type": "conv2d", "in_channels": 2, "out_channels": 2, "padding": [1, 1]},
                {"type": "batch_norm", "num_features": 2},
                {"type": "sequential", "modules": [{"type": "leaky_relu"}, {"type": "tanh"}]},
                {"type": "residual", "modules": [{"type": "gelu"}], "shortcuts": [{"from": 0, "to": 2}]}
            ],
            "shortcuts": [{"from": 1, "to": 3}]
        }"#;
        let config = ResidualConfig::from_json_str(json).unwrap();
        assert_eq!(
            config.modules[1],
            LayerConfig::BatchNorm { num_features: 2, feature_axis: 1, eps: 1e-5 }
        );
        assert_eq!(config.modules[2], LayerConfig::Sequential {
            modules: vec![LayerConfig::LeakyReLU { negative_slope: 0.01 }, LayerConfig::Tanh],
        });

        let mut rng = StdRng::seed_from_u64(1);
        let block = config.build(&mut rng).unwrap();
        let x = Tensor::random_uniform(&[1, 2, 4, 4], -1.0, 1.0, &mut rng);
        assert_eq!(block.forward(&x).unwrap().shape(), &[1, 2, 4, 4]);
    }

    #[test]
    fn test_invalid_shortcut_is_reported() {
        let json = r#"{"modules": [{"type": "relu"}], "shortcuts": [{"from": 2, "to": 1}]}"#;
        let config = ResidualConfig::from_json_str(json).unwrap();
        let err = config.build(&mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Residual(ResidualError::InvalidShortcut { from: 2, to: 1, num_modules: 1 })
        ));
    }

    #[test]
    fn test_unknown_layer_type_is_a_json_error() {
        let json = r#"{"modules": [{"type": "attention"}]}"#;
        assert!(matches!(
            ResidualConfig::from_json_str(json),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_invalid_layer_is_rejected() {
        let layer = LayerConfig::Linear { in_features: 0, out_features: 3, bias: true };
        assert!(matches!(
            layer.build(&mut StdRng::seed_from_u64(0)),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_json_round_trip_keeps_topology() {
        let config = ResidualConfig::from_json_str(PROJECTED_BLOCK).unwrap();
        let json = config.to_json_string().unwrap();
        assert_eq!(ResidualConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let err = ResidualConfig::from_path("/nonexistent/block.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
