use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::time::Instant;

use super::{http_client, ClientError, ReadingSource};
use crate::config::InfluxConfig;
use crate::models::Reading;

/// # InfluxDB v2 query client
///
/// Queries go to `POST {url}/api/v2/query?org={org}` with a Flux script as
/// the body (`Content-Type: application/vnd.flux`) and a
/// `Authorization: Token {token}` header. With `Accept: application/csv` the
/// server answers in annotated CSV:
///
/// ```text
/// #datatype,string,long,dateTime:RFC3339,double,string
/// #group,false,false,false,false,true
/// #default,mean,,,,
/// ,result,table,_time,_value,_measurement
/// ,,0,2024-03-01T08:00:00Z,97.9,DS18B20
/// ,,0,2024-03-01T08:01:00Z,98.0,DS18B20
/// ```
///
/// Annotation rows start with `#`, every table starts with its own header row,
/// and tables are separated by blank lines. Lines end in `\r\n`, and values
/// containing commas or quotes are quoted.
pub struct InfluxClient {
    client: reqwest::Client,
    url: String,
    token: String,
    org: String,
    bucket: String,
}

impl InfluxClient {
    pub fn new(config: &InfluxConfig) -> Result<Self, ClientError> {
        let missing = config.missing();
        if !missing.is_empty() {
            return Err(ClientError::MissingSetting(missing.join(", ")));
        }
        let setting = |value: &Option<String>| value.clone().unwrap_or_default();

        let client = Self {
            client: http_client()?,
            url: setting(&config.url).trim_end_matches('/').to_string(),
            token: setting(&config.token),
            org: setting(&config.org),
            bucket: setting(&config.bucket),
        };
        info!("InfluxDB client initialized for bucket {}", client.bucket);
        Ok(client)
    }

    fn readings_query(&self, sensor_id: &str, minutes: u64) -> String {
        format!(
            r#"from(bucket: "{bucket}")
  |> range(start: -{minutes}m)
  |> filter(fn: (r) => r["_measurement"] == "{sensor_id}")
  |> filter(fn: (r) => r["dimension"] == "temperature")
  |> filter(fn: (r) => r["_field"] == "mean")
  |> yield(name: "mean")"#,
            bucket = self.bucket,
        )
    }

    fn activity_query(&self, seconds: u64) -> String {
        format!(
            r#"from(bucket: "{bucket}")
  |> range(start: -{seconds}s)
  |> filter(fn: (r) => r["_field"] == "mean")
  |> count()
  |> yield(name: "count")"#,
            bucket = self.bucket,
        )
    }

    async fn query(&self, flux: String) -> Result<String, ClientError> {
        let response = self
            .client
            .post(format!("{}/api/v2/query", self.url))
            .query(&[("org", self.org.as_str())])
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "application/vnd.flux")
            .header("Accept", "application/csv")
            .body(flux)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl ReadingSource for InfluxClient {
    async fn query_recent_readings(&self, sensor_id: &str, minutes: u64) -> Vec<Reading> {
        let start = Instant::now();
        let result = match self.query(self.readings_query(sensor_id, minutes)).await {
            Ok(body) => parse_readings(sensor_id, &body),
            Err(e) => {
                error!("Error querying InfluxDB for {}: {}", sensor_id, e);
                Vec::new()
            }
        };
        debug!(
            "query_recent_readings({}) returned {} readings in {} ms",
            sensor_id,
            result.len(),
            start.elapsed().as_millis()
        );
        result
    }

    async fn check_recent_activity(&self, seconds: u64) -> bool {
        match self.query(self.activity_query(seconds)).await {
            Ok(body) => total_count(&body) > 0,
            Err(e) => {
                error!("Error checking for recent data: {}", e);
                false
            }
        }
    }
}

/// Rows of an annotated CSV response keyed by column name. Fields follow
/// RFC 4180 quoting, so tag values may contain commas or quotes.
fn csv_records(body: &str) -> Vec<HashMap<String, String>> {
    let body = body.replace("\r\n", "\n");
    let mut records = Vec::new();

    for table in body.split("\n\n").filter(|t| !t.trim().is_empty()) {
        let mut reader = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .flexible(true)
            .from_reader(table.as_bytes());

        let header = match reader.headers() {
            Ok(header) => header.clone(),
            Err(e) => {
                warn!("Skipping CSV table without a readable header: {}", e);
                continue;
            }
        };

        for row in reader.records() {
            match row {
                Ok(row) => records.push(
                    header
                        .iter()
                        .map(String::from)
                        .zip(row.iter().map(String::from))
                        .collect(),
                ),
                Err(e) => warn!("Skipping malformed CSV row: {}", e),
            }
        }
    }

    records
}

fn parse_readings(sensor_id: &str, body: &str) -> Vec<Reading> {
    let mut readings: Vec<Reading> = csv_records(body)
        .into_iter()
        .filter_map(|record| {
            let timestamp = DateTime::parse_from_rfc3339(record.get("_time")?).ok()?;
            let value = record.get("_value")?.parse::<f64>().ok()?;
            Some(Reading::new(sensor_id, timestamp.with_timezone(&Utc), value))
        })
        .collect();

    readings.sort_by_key(|r| r.timestamp);
    readings
}

fn total_count(body: &str) -> i64 {
    csv_records(body)
        .iter()
        .filter_map(|record| record.get("_value")?.parse::<i64>().ok())
        .sum()
}
