//! HTTP JSON implementation of the Computation Service client.
//!
//! Operations are POSTed as camelCase JSON to `{base_url}/{operation}`.
//! Transport failures and non-success statuses map to
//! [`OracleError::Transport`]; a rejection status with a well-formed error
//! body maps to [`OracleError::Rejected`] (this is how consistency
//! violations such as oversells surface).

use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use super::{
    AdjustSplitsDividendsRequest, ApplyTransactionsRequest, ApplyTransactionsResponse,
    AveragePriceRequest, ComputeClientTrait, OracleRejection, PositionsEnvelope,
    PositionsResponse, PricePositionsRequest, SnapshotFragment, ValidateTransactionsRequest,
    ValidationVerdict,
};
use crate::errors::{Error, OracleError, Result};
use crate::ledger::Transaction;
use crate::portfolio::snapshot::{PortfolioSnapshot, Position};
use crate::portfolio::valuation::PriceType;

const OP_APPLY_TRANSACTIONS: &str = "update_portfolio_transactions";
const OP_ADJUST_SPLITS_DIVIDENDS: &str = "update_portfolio_splits_dividends";
const OP_PRICE: &str = "update_portfolio_price";
const OP_AVERAGE_PRICE: &str = "update_portfolio_average_price";
const OP_VALIDATE: &str = "validate_transactions";

/// Default request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpComputeClient {
    client: Client,
    base_url: String,
}

impl HttpComputeClient {
    /// Create a client for the service at `base_url`. The underlying
    /// connection pool is reused across calls.
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn call<Req, Resp>(&self, operation: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, operation);
        debug!("Calling computation service: {}", operation);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST
            || status == reqwest::StatusCode::UNPROCESSABLE_ENTITY
        {
            let rejection: OracleRejection = response
                .json()
                .await
                .map_err(|e| OracleError::Protocol(e.to_string()))?;
            return Err(Error::Oracle(OracleError::Rejected(rejection.error)));
        }
        if !status.is_success() {
            return Err(Error::Oracle(OracleError::Transport(format!(
                "{}: HTTP error {}",
                operation, status
            ))));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| Error::Oracle(OracleError::Protocol(e.to_string())))
    }
}

#[async_trait]
impl ComputeClientTrait for HttpComputeClient {
    async fn apply_transactions(
        &self,
        positions: &[Position],
        transactions: &[Transaction],
    ) -> Result<ApplyTransactionsResponse> {
        let request = ApplyTransactionsRequest {
            portfolio: PositionsEnvelope { positions },
            transactions,
        };
        self.call(OP_APPLY_TRANSACTIONS, &request).await
    }

    async fn adjust_splits_dividends(
        &self,
        snapshot: &PortfolioSnapshot,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<SnapshotFragment>> {
        let request = AdjustSplitsDividendsRequest {
            portfolio: snapshot,
            start_date,
            end_date,
        };
        self.call(OP_ADJUST_SPLITS_DIVIDENDS, &request).await
    }

    async fn price_positions(
        &self,
        positions: &[Position],
        date: NaiveDate,
        price_type: PriceType,
    ) -> Result<Vec<Position>> {
        let request = PricePositionsRequest {
            portfolio: PositionsEnvelope { positions },
            date,
            price_type,
        };
        let response: PositionsResponse = self.call(OP_PRICE, &request).await?;
        Ok(response.positions)
    }

    async fn average_price(
        &self,
        portfolio_history: &[PortfolioSnapshot],
    ) -> Result<Vec<Position>> {
        let request = AveragePriceRequest { portfolio_history };
        let response: PositionsResponse = self.call(OP_AVERAGE_PRICE, &request).await?;
        Ok(response.positions)
    }

    async fn validate_transactions(
        &self,
        request: &ValidateTransactionsRequest,
    ) -> Result<ValidationVerdict> {
        self.call(OP_VALIDATE, request).await
    }
}
