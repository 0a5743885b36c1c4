use serde::Serialize;
use tracing::{debug, error, info};

use mobench_core::{
    render_thermal_zones, BatterySnapshot, DeviceIdentity, ModelSpec, RunMetrics, UploadConfig,
};

/// One benchmark run shaped for the collection endpoint. Field spellings
/// match what the backend stores, misspellings included.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEntry {
    pub start_ms: u64,
    pub stop_ms: u64,
    pub tps: f64,
    pub ttft: u64,
    pub inference_time: u64,
    pub output_tokens: u32,
    pub input_tokens: u32,
    pub ram: Vec<u64>,
    #[serde(rename = "batteryTempreture")]
    pub battery_temperature: [Option<f32>; 2],
    #[serde(rename = "sensorTempreratures")]
    pub sensor_temperatures: [String; 2],
    /// Battery level as 0..1 fractions, [start, end].
    pub battery: [Option<f32>; 2],
    pub battery_infos: [Option<BatterySnapshot>; 2],
    pub start_ram_usage_pct: f64,
    pub end_ram_usage_pct: f64,
}

impl RunEntry {
    pub fn from_metrics(metrics: &RunMetrics) -> Self {
        Self {
            start_ms: metrics.started_at_ms,
            stop_ms: metrics.stopped_at_ms(),
            tps: metrics.outcome.tokens_per_sec,
            ttft: metrics.outcome.ttft_ms,
            inference_time: metrics.outcome.inference_time_ms,
            output_tokens: metrics.outcome.generated_tokens,
            input_tokens: metrics.input_tokens,
            ram: metrics.series.rss_mb(),
            battery_temperature: [metrics.start.battery_temp_c, metrics.end.battery_temp_c],
            sensor_temperatures: [
                render_thermal_zones(&metrics.start.thermals),
                render_thermal_zones(&metrics.end.thermals),
            ],
            battery: [metrics.start.battery_level, metrics.end.battery_level],
            battery_infos: [metrics.start.battery.clone(), metrics.end.battery.clone()],
            start_ram_usage_pct: metrics.start_ram_usage_pct,
            end_ram_usage_pct: metrics.end_ram_usage_pct,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub load_time: u64,
    pub runs: Vec<RunEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneData {
    pub model: String,
    pub brand: String,
    pub system_name: String,
    pub system_version: String,
    pub total_memory: u64,
}

impl PhoneData {
    pub fn from_identity(identity: &DeviceIdentity) -> Self {
        Self {
            model: identity.model.clone(),
            brand: identity.brand.clone(),
            system_name: identity.system_name.clone(),
            system_version: identity.system_version.clone(),
            total_memory: identity.total_memory_bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPayload {
    pub user_id: String,
    pub model: String,
    pub family: String,
    pub run_id: String,
    pub version: String,
    pub data: SessionData,
    pub phone_data: PhoneData,
}

impl UploadPayload {
    pub fn shape(
        identity: &DeviceIdentity,
        model: &ModelSpec,
        load_time_ms: u64,
        metrics: &RunMetrics,
        version: &str,
    ) -> Self {
        Self {
            user_id: identity.device_id.clone(),
            model: model.model_id.clone(),
            family: model.family(),
            run_id: uuid::Uuid::new_v4().to_string(),
            version: version.to_string(),
            data: SessionData {
                load_time: load_time_ms,
                runs: vec![RunEntry::from_metrics(metrics)],
            },
            phone_data: PhoneData::from_identity(identity),
        }
    }
}

/// Posts one run's metrics to the collection endpoint. 2xx is success,
/// anything else is a reported failure; the orchestrator never retries.
#[derive(Debug, Clone)]
pub struct MetricsReporter {
    endpoint: String,
    protect_key: String,
    version: String,
    client: reqwest::Client,
}

impl MetricsReporter {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            protect_key: config.protect_key.clone(),
            version: config.version.clone(),
            client: reqwest::Client::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub async fn post(&self, payload: &UploadPayload) -> bool {
        let url = format!("{}/saveBenchmark", self.endpoint);
        debug!(run_id = %payload.run_id, "posting metrics to {}", url);

        let response = self
            .client
            .post(&url)
            .header("X-PROTECT-KEY", &self.protect_key)
            .json(payload)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!(run_id = %payload.run_id, "metrics posted");
                true
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                error!("Failed to post metrics: HTTP {} - {}", status, body);
                false
            }
            Err(e) => {
                error!("Exception sending metrics to server: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mobench_core::{
        InferenceOutcome, TelemetryFrame, TelemetrySample, TelemetrySeries, ThermalZone,
    };

    fn sample_metrics() -> RunMetrics {
        let mut series = TelemetrySeries::new();
        series.push(TelemetrySample { at_ms: 1000, rss_mb: 900 });
        series.push(TelemetrySample { at_ms: 3000, rss_mb: 950 });
        series.push(TelemetrySample { at_ms: 5000, rss_mb: 920 });

        RunMetrics {
            outcome: InferenceOutcome {
                text: "The cat sat on the mat".into(),
                generated_tokens: 10,
                inference_time_ms: 800,
                ttft_ms: 120,
                tokens_per_sec: 14.29,
                success: true,
            },
            series,
            start: TelemetryFrame {
                rss_mb: 900,
                battery_temp_c: Some(30.5),
                thermals: vec![ThermalZone { label: "cpu-thermal".into(), celsius: 45.0 }],
                battery: Some(BatterySnapshot {
                    battery_capacity_mah: 3000.0,
                    remaining_capacity_mah: 2400.0,
                    used_capacity_mah: 600.0,
                    battery_percentage: 80.0,
                    ..Default::default()
                }),
                battery_level: Some(0.75),
            },
            end: TelemetryFrame {
                rss_mb: 920,
                battery_temp_c: Some(31.0),
                thermals: vec![ThermalZone { label: "cpu-thermal".into(), celsius: 47.5 }],
                battery: None,
                battery_level: Some(0.5),
            },
            started_at_ms: 1000,
            input_tokens: 10,
            start_ram_usage_pct: 11.0,
            end_ram_usage_pct: 11.2,
        }
    }

    fn sample_identity() -> DeviceIdentity {
        DeviceIdentity {
            device_id: "device-1234".into(),
            model: "Pixel 7 Pro".into(),
            brand: "google".into(),
            system_name: "Linux".into(),
            system_version: "6.1.0".into(),
            total_memory_bytes: 8 * 1024 * 1024 * 1024,
        }
    }

    #[test]
    fn payload_pins_the_wire_field_spellings() {
        let payload = UploadPayload::shape(
            &sample_identity(),
            &ModelSpec::new("Llama_3.2_1B"),
            500,
            &sample_metrics(),
            "mobench-0.1.0",
        );
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["userId"], "device-1234");
        assert_eq!(json["model"], "Llama_3.2_1B");
        assert_eq!(json["family"], "Llama 3.2 1B");
        assert_eq!(json["version"], "mobench-0.1.0");
        assert!(json["runId"].as_str().is_some());

        let data = &json["data"];
        assert_eq!(data["loadTime"], 500);
        let run = &data["runs"][0];
        assert_eq!(run["startMs"], 1000);
        assert_eq!(run["stopMs"], 1800);
        assert_eq!(run["ttft"], 120);
        assert_eq!(run["inferenceTime"], 800);
        assert_eq!(run["outputTokens"], 10);
        assert_eq!(run["inputTokens"], 10);
        assert_eq!(run["ram"], serde_json::json!([900, 950, 920]));
        assert_eq!(run["batteryTempreture"], serde_json::json!([30.5, 31.0]));
        assert_eq!(
            run["sensorTempreratures"],
            serde_json::json!(["cpu-thermal: 45\n", "cpu-thermal: 47.5\n"])
        );
        assert_eq!(run["battery"], serde_json::json!([0.75, 0.5]));
        assert_eq!(run["batteryInfos"][0]["batteryCapacityMah"], 3000.0);
        assert!(run["batteryInfos"][1].is_null());
        assert_eq!(run["startRamUsagePct"], 11.0);

        let phone = &json["phoneData"];
        assert_eq!(phone["model"], "Pixel 7 Pro");
        assert_eq!(phone["brand"], "google");
        assert_eq!(phone["systemName"], "Linux");
        assert_eq!(phone["systemVersion"], "6.1.0");
        assert_eq!(phone["totalMemory"], 8u64 * 1024 * 1024 * 1024);
    }
}
