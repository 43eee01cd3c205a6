// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Allocation parameters of a job

use crate::block::HostPolicy;
use crate::errors::PlanError;
use crate::partition::DEFAULT_SUB_BLOCK_PREFIX;
use derive_builder::Builder;
use std::fmt::Display;
use std::num::NonZero;

pub const DEFAULT_BASE_PORT: u16 = 1;
pub const DEFAULT_PORTS_PER_USER: u16 = 1000;

/// Parameters applied to every job of a run. N.B. we derive a builder type
/// `AllocParamsBuilder` with defaults for each field.
#[derive(Builder, Debug, Clone, Copy, PartialEq, Eq)]
#[builder(build_fn(private, name = "_build"))]
pub struct AllocParams {
    /// First port of the first range handed out under each public address
    #[builder(default = "DEFAULT_BASE_PORT")]
    pub base_port: u16,

    /// Width of the port range of each private host
    #[builder(default = "DEFAULT_PORTS_PER_USER")]
    pub ports_per_user: u16,

    /// Prefix length of the sub-blocks the private pool is split into
    #[builder(default = "DEFAULT_SUB_BLOCK_PREFIX")]
    pub sub_block_prefix: u8,

    /// Which addresses of each private sub-block are allocated
    #[builder(default)]
    pub host_policy: HostPolicy,

    /// Which addresses of the public pool are used as translation targets
    #[builder(default)]
    pub public_policy: HostPolicy,
}

impl Default for AllocParams {
    fn default() -> Self {
        Self {
            base_port: DEFAULT_BASE_PORT,
            ports_per_user: DEFAULT_PORTS_PER_USER,
            sub_block_prefix: DEFAULT_SUB_BLOCK_PREFIX,
            host_policy: HostPolicy::default(),
            public_policy: HostPolicy::default(),
        }
    }
}

impl AllocParamsBuilder {
    /// Build the parameters, with defaults for the fields left unset.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the parameters fail [`AllocParams::validate`].
    pub fn build(&self) -> Result<AllocParams, AllocParamsBuilderError> {
        let params = self._build()?;
        params
            .validate()
            .map_err(|e| AllocParamsBuilderError::ValidationError(e.to_string()))?;
        Ok(params)
    }
}

impl AllocParams {
    /// # Errors
    ///
    /// Rejects a zero base port, a zero range width and sub-block prefixes over 32.
    pub fn validate(&self) -> Result<(), PlanError> {
        self.ports()?;
        if self.sub_block_prefix > 32 {
            return Err(PlanError::InvalidSubBlockPrefix(self.sub_block_prefix));
        }
        Ok(())
    }

    /// Base port and range width, checked non-zero
    pub(crate) fn ports(&self) -> Result<(NonZero<u16>, NonZero<u16>), PlanError> {
        let base = NonZero::new(self.base_port)
            .ok_or(PlanError::InvalidParams("base port must be in [1, 65535]"))?;
        let width = NonZero::new(self.ports_per_user)
            .ok_or(PlanError::InvalidParams("ports per user must be at least 1"))?;
        Ok((base, width))
    }

    /// How many hosts one public address can serve
    #[must_use]
    pub fn hosts_per_public_address(&self) -> u32 {
        match self.ports() {
            Ok((base, width)) => {
                (u32::from(u16::MAX) + 1 - u32::from(base.get())) / u32::from(width.get())
            }
            Err(_) => 0,
        }
    }
}

impl Display for AllocParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        writeln!(f, "Allocation parameters")?;
        writeln!(f, "  base port       : {}", self.base_port)?;
        writeln!(f, "  ports per user  : {}", self.ports_per_user)?;
        writeln!(f, "  sub-block prefix: /{}", self.sub_block_prefix)?;
        writeln!(f, "  host policy     : {}", self.host_policy)?;
        write!(f, "  public policy   : {}", self.public_policy)
    }
}

#[cfg(test)]
mod test {
    use super::{AllocParams, AllocParamsBuilder, AllocParamsBuilderError};
    use crate::{HostPolicy, PlanError};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builder_defaults() {
        let params = AllocParamsBuilder::default().build().unwrap();
        assert_eq!(params, AllocParams::default());
        assert_eq!(params.base_port, 1);
        assert_eq!(params.ports_per_user, 1000);
        assert_eq!(params.sub_block_prefix, 26);
        assert_eq!(params.host_policy, HostPolicy::UsableHosts);
        assert_eq!(params.public_policy, HostPolicy::UsableHosts);
        assert!(params.validate().is_ok());
        assert_eq!(params.hosts_per_public_address(), 65);
    }

    #[test]
    fn test_builder_overrides() {
        let params = AllocParamsBuilder::default()
            .base_port(1024)
            .ports_per_user(2048)
            .host_policy(HostPolicy::AllAddresses)
            .build()
            .unwrap();
        assert_eq!(params.base_port, 1024);
        assert_eq!(params.ports_per_user, 2048);
        assert_eq!(params.host_policy, HostPolicy::AllAddresses);
        assert_eq!(params.hosts_per_public_address(), 31);
    }

    #[test]
    fn test_validate() {
        let params = AllocParams {
            base_port: 0,
            ..AllocParams::default()
        };
        assert!(matches!(params.validate(), Err(PlanError::InvalidParams(_))));
        assert_eq!(params.hosts_per_public_address(), 0);

        let params = AllocParams {
            ports_per_user: 0,
            ..AllocParams::default()
        };
        assert!(matches!(params.validate(), Err(PlanError::InvalidParams(_))));

        let params = AllocParams {
            sub_block_prefix: 40,
            ..AllocParams::default()
        };
        assert_eq!(params.validate(), Err(PlanError::InvalidSubBlockPrefix(40)));
    }

    #[test]
    fn test_builder_rejects_invalid_params() {
        let err = AllocParamsBuilder::default().base_port(0).build().unwrap_err();
        let AllocParamsBuilderError::ValidationError(reason) = err else {
            panic!("unexpected error {err}");
        };
        assert!(reason.contains("base port"), "{reason}");

        let err = AllocParamsBuilder::default().ports_per_user(0).build().unwrap_err();
        assert!(matches!(err, AllocParamsBuilderError::ValidationError(_)));

        let err = AllocParamsBuilder::default()
            .sub_block_prefix(40)
            .build()
            .unwrap_err();
        assert!(
            matches!(err, AllocParamsBuilderError::ValidationError(ref m) if m.contains("40")),
            "{err}"
        );
    }
}
