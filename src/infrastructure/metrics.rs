// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

use crate::config::settings::MetricsSettings;

/// 初始化指标系统
///
/// 安装 Prometheus 导出器并注册流水线指标
pub fn init_metrics(settings: &MetricsSettings) {
    if !settings.enabled {
        info!("Metrics exporter disabled");
        return;
    }

    let addr: SocketAddr = match settings.listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!(
                "Invalid metrics address {}: {}, metrics disabled",
                settings.listen_addr, e
            );
            return;
        }
    };

    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!(
            "Failed to install Prometheus recorder: {}. This might happen if the port is already in use.",
            e
        );
        return;
    }

    describe_metrics();
    info!("Metrics exporter listening on {}", addr);
}

fn describe_metrics() {
    describe_histogram!(
        "stage_duration_seconds",
        Unit::Seconds,
        "Duration of a single pipeline stage"
    );
    describe_counter!(
        "stage_failures_total",
        "Number of pipeline stages that failed"
    );
    describe_counter!(
        "batch_children_total",
        "Number of batch child runs, labelled by outcome"
    );
    describe_counter!(
        "cost_record_failures_total",
        "Number of cost entries that could not be recorded"
    );
    describe_counter!("jobs_enqueued_total", "Number of jobs handed to workers");
}
