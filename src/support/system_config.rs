//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Crymap.
//
// Crymap is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Crymap is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Crymap. If not, see <http://www.gnu.org/licenses/>.

use serde::{Deserialize, Serialize};

use super::error::Error;

/// The system-wide configuration.
///
/// This is normally the `[quota]` section of the host server's TOML
/// configuration file; every field has a default, so an empty file is valid.
#[derive(Clone, Debug, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SystemConfig {
    /// Options relating to the QUOTA extension.
    #[serde(default)]
    pub quota: QuotaConfig,
}

impl SystemConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        Ok(toml::from_str(s)?)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct QuotaConfig {
    /// If false, the QUOTA capability is never advertised and the QUOTA
    /// commands are treated as unknown.
    pub enabled: bool,

    /// The maximum number of resources a single `SETQUOTA` may name.
    ///
    /// Commands naming more are refused with `NO` before the backend sees
    /// them.
    pub max_set_resources: usize,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        QuotaConfig {
            enabled: true,
            max_set_resources: 16,
        }
    }
}
