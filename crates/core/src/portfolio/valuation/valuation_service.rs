//! Valuation Layer: prices snapshots through the Computation Service.
//!
//! Sub-position advice groups are priced with independent oracle calls (the
//! pricing oracle rejects lists with duplicate securities, and groups may
//! repeat a security); the calls run concurrently and are joined.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::try_join_all;
use log::{debug, warn};
use std::collections::BTreeSet;
use std::sync::Arc;

use super::valuation_calculator::calculate_valuation;
use super::{PricedSnapshot, ValuationConfig};
use crate::compute::ComputeClientTrait;
use crate::errors::{Error, Result};
use crate::portfolio::snapshot::{PortfolioSnapshot, Position};

#[async_trait]
pub trait ValuationServiceTrait: Send + Sync {
    /// Prices the snapshot. Errors propagate - for user-triggered
    /// transaction/validation paths.
    async fn valuate(
        &self,
        snapshot: &PortfolioSnapshot,
        config: &ValuationConfig,
        as_of: NaiveDate,
    ) -> Result<PricedSnapshot>;

    /// Prices the snapshot for a passive refresh read: on oracle failure the
    /// snapshot is valued from the last successfully stored prices instead
    /// of propagating the error.
    async fn valuate_or_last(
        &self,
        snapshot: &PortfolioSnapshot,
        config: &ValuationConfig,
        as_of: NaiveDate,
    ) -> PricedSnapshot;
}

#[derive(Clone)]
pub struct ValuationService {
    compute: Arc<dyn ComputeClientTrait>,
}

impl ValuationService {
    pub fn new(compute: Arc<dyn ComputeClientTrait>) -> Self {
        Self { compute }
    }

    async fn price_all(
        &self,
        snapshot: &PortfolioSnapshot,
        config: &ValuationConfig,
        as_of: NaiveDate,
    ) -> Result<(Vec<Position>, Vec<Position>)> {
        let priced_positions = if snapshot.positions.is_empty() {
            Vec::new()
        } else {
            self.compute
                .price_positions(&snapshot.positions, as_of, config.price_type)
                .await?
        };

        let advice_groups: BTreeSet<Option<String>> = snapshot
            .sub_positions
            .iter()
            .map(|p| p.origin_advice.clone())
            .collect();

        let mut calls = Vec::with_capacity(advice_groups.len());
        for advice in advice_groups {
            let group = snapshot.advice_group(advice.as_deref());
            let compute = Arc::clone(&self.compute);
            let price_type = config.price_type;
            calls.push(async move {
                let priced = compute.price_positions(&group, as_of, price_type).await?;
                Ok::<_, Error>((advice, priced))
            });
        }
        let group_results = try_join_all(calls).await?;

        let mut priced_sub_positions = Vec::with_capacity(snapshot.sub_positions.len());
        for (advice, priced) in group_results {
            priced_sub_positions.extend(priced.into_iter().map(|mut p| {
                p.origin_advice = advice.clone();
                p
            }));
        }

        Ok((priced_positions, priced_sub_positions))
    }
}

#[async_trait]
impl ValuationServiceTrait for ValuationService {
    async fn valuate(
        &self,
        snapshot: &PortfolioSnapshot,
        config: &ValuationConfig,
        as_of: NaiveDate,
    ) -> Result<PricedSnapshot> {
        debug!(
            "Valuating snapshot [{}, {}] as of {}",
            snapshot.start_date, snapshot.end_date, as_of
        );
        let (positions, sub_positions) = self.price_all(snapshot, config, as_of).await?;
        Ok(calculate_valuation(
            snapshot,
            positions,
            sub_positions,
            config,
            as_of,
        ))
    }

    async fn valuate_or_last(
        &self,
        snapshot: &PortfolioSnapshot,
        config: &ValuationConfig,
        as_of: NaiveDate,
    ) -> PricedSnapshot {
        match self.valuate(snapshot, config, as_of).await {
            Ok(priced) => priced,
            Err(e) => {
                warn!(
                    "Pricing failed for snapshot [{}, {}]: {}. Returning last priced state.",
                    snapshot.start_date, snapshot.end_date, e
                );
                calculate_valuation(
                    snapshot,
                    snapshot.positions.clone(),
                    snapshot.sub_positions.clone(),
                    config,
                    as_of,
                )
            }
        }
    }
}
