//! Prometheus metrics for the sale client

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

pub struct Metrics {
    pub read_failures_total: IntCounterVec,
    pub transactions_submitted_total: IntCounterVec,
    pub transactions_confirmed_total: IntCounterVec,
    pub transactions_failed_total: IntCounterVec,
    pub polls_total: IntCounter,
    pub tokens_minted: IntGauge,
    pub presale_timer_active: IntGauge,
    pub registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let read_failures_total = IntCounterVec::new(
            Opts::new(
                "mint_client_read_failures_total",
                "Contract reads that failed, by fact",
            ),
            &["fact"],
        )
        .expect("constant metric name is valid");

        let transactions_submitted_total = IntCounterVec::new(
            Opts::new(
                "mint_client_transactions_submitted_total",
                "Transactions broadcast, by kind",
            ),
            &["kind"],
        )
        .expect("constant metric name is valid");

        let transactions_confirmed_total = IntCounterVec::new(
            Opts::new(
                "mint_client_transactions_confirmed_total",
                "Transactions confirmed on chain, by kind",
            ),
            &["kind"],
        )
        .expect("constant metric name is valid");

        let transactions_failed_total = IntCounterVec::new(
            Opts::new(
                "mint_client_transactions_failed_total",
                "Transactions that failed to submit or reverted, by kind and error",
            ),
            &["kind", "error"],
        )
        .expect("constant metric name is valid");

        let polls_total = IntCounter::new(
            "mint_client_polls_total",
            "Timer ticks executed by the polling scheduler",
        )
        .expect("constant metric name is valid");

        let tokens_minted = IntGauge::new(
            "mint_client_tokens_minted",
            "Tokens minted as last read from the contract",
        )
        .expect("constant metric name is valid");

        let presale_timer_active = IntGauge::new(
            "mint_client_presale_timer_active",
            "1 while the presale status timer is running",
        )
        .expect("constant metric name is valid");

        // Names are unique constants and registration happens once per Metrics
        registry
            .register(Box::new(read_failures_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(transactions_submitted_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(transactions_confirmed_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(transactions_failed_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(polls_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(tokens_minted.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(presale_timer_active.clone()))
            .expect("metric registration must not be called twice");

        Self {
            read_failures_total,
            transactions_submitted_total,
            transactions_confirmed_total,
            transactions_failed_total,
            polls_total,
            tokens_minted,
            presale_timer_active,
            registry,
        }
    }
}
