//! Curve registry: id -> curve instance.
//!
//! Ids are assigned sequentially from 1 and never reused. An instance is
//! identified by pointer, so the same `Arc` cannot be registered twice.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::info;

use crate::config::BondingCurveConfig;
use crate::domain::CurveId;
use crate::error::{VaultError, VaultResult};

use super::{from_spec, BondingCurve};

#[derive(Debug, Clone, Default)]
pub struct CurveRegistry {
    curves: BTreeMap<CurveId, Arc<dyn BondingCurve>>,
    ids_by_name: BTreeMap<String, CurveId>,
}

impl CurveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the configured built-in curves in declaration order.
    pub fn from_config(config: &BondingCurveConfig) -> VaultResult<Self> {
        let mut registry = Self::new();
        for spec in &config.curves {
            registry.add_curve(from_spec(spec)?)?;
        }
        Ok(registry)
    }

    pub fn add_curve(&mut self, curve: Arc<dyn BondingCurve>) -> VaultResult<CurveId> {
        if let Some((id, _)) = self.curves.iter().find(|(_, c)| Arc::ptr_eq(c, &curve)) {
            return Err(VaultError::CurveAlreadyExists(*id));
        }
        let name = curve.name().to_string();
        if name.is_empty() {
            return Err(VaultError::EmptyCurveName);
        }
        if self.ids_by_name.contains_key(&name) {
            return Err(VaultError::CurveNameNotUnique(name));
        }

        let id = CurveId::try_from(self.curves.len() + 1).map_err(|_| VaultError::Overflow)?;
        info!(
            "event=curve_registered module=curves status=ok curve_id={} name={:?}",
            id, name
        );
        self.ids_by_name.insert(name, id);
        self.curves.insert(id, curve);
        Ok(id)
    }

    pub fn get_curve(&self, id: CurveId) -> VaultResult<&Arc<dyn BondingCurve>> {
        self.curves.get(&id).ok_or(VaultError::CurveDoesNotExist(id))
    }

    pub fn curve_id_by_name(&self, name: &str) -> Option<CurveId> {
        self.ids_by_name.get(name).copied()
    }

    pub fn contains(&self, id: CurveId) -> bool {
        self.curves.contains_key(&id)
    }

    pub fn count(&self) -> usize {
        self.curves.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CurveId, &Arc<dyn BondingCurve>)> {
        self.curves.iter().map(|(id, c)| (*id, c))
    }
}
