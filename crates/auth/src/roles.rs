use serde::{Deserialize, Serialize};

/// Organisational role held by a profile.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Field sales; submits weekly forecasts and reports stock-back.
    Sales,
    /// Owns a group of sales teams; sets their daily targets.
    ZonalManager,
    /// Central stock; first forecast approver, assigns kitchens, disperses.
    StockManager,
    /// Second forecast approver; approves bulk buys.
    Finance,
    /// Buys ingredients and confirms their arrival.
    Purchaser,
    /// Cooks assigned items.
    Kitchen,
    /// Moves finished goods to and from the field.
    Logistics,
    /// Allowed everything.
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Sales => "sales",
            Role::ZonalManager => "zonal_manager",
            Role::StockManager => "stock_manager",
            Role::Finance => "finance",
            Role::Purchaser => "purchaser",
            Role::Kitchen => "kitchen",
            Role::Logistics => "logistics",
            Role::Admin => "admin",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
