use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A probing vantage point with its own transport channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    /// US East (N. Virginia)
    #[serde(rename = "us-east-1")]
    UsEast1,
    /// EU West (Ireland)
    #[serde(rename = "eu-west-1")]
    EuWest1,
    /// Asia Pacific (Mumbai)
    #[serde(rename = "ap-south-1")]
    ApSouth1,
}

impl Region {
    /// All regions known to the system.
    pub const ALL: [Self; 3] = [Self::UsEast1, Self::EuWest1, Self::ApSouth1];

    /// Canonical region identifier.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UsEast1 => "us-east-1",
            Self::EuWest1 => "eu-west-1",
            Self::ApSouth1 => "ap-south-1",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "us-east-1" => Ok(Self::UsEast1),
            "eu-west-1" => Ok(Self::EuWest1),
            "ap-south-1" => Ok(Self::ApSouth1),
            other => Err(format!("unknown region: {other}")),
        }
    }
}

/// HTTP method used for a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// PATCH
    Patch,
}

impl HttpMethod {
    /// Method name as sent on the wire.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Patch => "PATCH",
        }
    }

    /// Whether a request body is sent for this method.
    pub const fn allows_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate status of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonitorStatus {
    /// Last check succeeded.
    Up,
    /// Last check failed.
    Down,
    /// Never checked yet.
    Pending,
}

impl MonitorStatus {
    /// Status label as stored and sent on the wire.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Pending => "PENDING",
        }
    }
}

/// Lifecycle status of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IncidentStatus {
    /// Incident exists and is unresolved.
    Open,
    /// Incident is closed. Terminal.
    Resolved,
}

impl IncidentStatus {
    /// Status label as stored and sent on the wire.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Resolved => "RESOLVED",
        }
    }
}
