//! Replicas of a data-parallel run.

pub use crate::{
    config::{Config, Validate},
    error::Error,
};
pub use burn::optim::GradientsParams;

use std::env;

#[derive(Config, Copy, Debug, Eq, PartialEq)]
pub struct DistributedConfig {
    #[config(default = "0")]
    pub rank: usize,

    #[config(default = "1")]
    pub world_size: usize,
}

/// A participant of a data-parallel run.
pub trait Replica {
    fn rank(&self) -> usize;

    fn world_size(&self) -> usize;

    /// The replica that previews, logs, validates and exports.
    #[inline]
    fn is_primary_replica(&self) -> bool {
        self.rank() == 0
    }

    /// Averaging the gradients across every replica.
    fn all_reduce_gradients(
        &self,
        grads: GradientsParams,
    ) -> GradientsParams;
}

/// A replica without peers to exchange gradients with.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SingleReplica {
    pub config: DistributedConfig,
}

impl DistributedConfig {
    /// Reading `WORLD_SIZE` and `LOCAL_RANK` from the environment.
    ///
    /// Missing variables fall back to a single replica.
    pub fn from_env() -> Result<Self, Error> {
        let read = |key: &str, default: usize| match env::var(key) {
            Ok(value) => value.trim().parse::<usize>().map_err(|err| {
                Error::InvalidConfig(format!("{key} should be an integer: {err}"))
            }),
            Err(_) => Ok(default),
        };

        let config = Self {
            rank: read("LOCAL_RANK", 0)?,
            world_size: read("WORLD_SIZE", 1)?,
        };
        config.validate()?;

        Ok(config)
    }

    #[inline]
    pub fn init(&self) -> SingleReplica {
        SingleReplica { config: *self }
    }
}

impl Replica for SingleReplica {
    #[inline]
    fn rank(&self) -> usize {
        self.config.rank
    }

    #[inline]
    fn world_size(&self) -> usize {
        self.config.world_size
    }

    #[inline]
    fn all_reduce_gradients(
        &self,
        grads: GradientsParams,
    ) -> GradientsParams {
        grads
    }
}

impl Validate for DistributedConfig {
    fn validate(&self) -> Result<(), Error> {
        if self.world_size == 0 || self.rank >= self.world_size {
            return Err(Error::InvalidConfig(format!(
                "Rank should be less than the world size: {self:?}"
            )));
        }
        Ok(())
    }
}

impl Default for DistributedConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
