//! Detector GraphQL request/response types.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::fmt;

use clipqa_models::DetectedSegment;

/// Ingest engine: pulls the source URL into a stream.
pub const INGEST_ENGINE_ID: &str = "9e611ad7-2d3b-48f6-a51b-0a1ba40fe255";
/// Chunk engine: splits the stream into fixed-length video chunks.
pub const CHUNK_ENGINE_ID: &str = "8bdb0e3b-ff28-4f6e-a3ba-887bd06e6440";
/// Shot detection engine.
pub const SHOT_ENGINE_ID: &str = "4a8e3cc4-04b8-430b-bbbe-cac33d6b5b23";
/// Output writer engine.
pub const OUTPUT_WRITER_ENGINE_ID: &str = "8eccf9cc-6b6d-4d7d-8cb3-7ebf4950c5f3";

const TASK_PRIORITY: i32 = -95;
const CHUNK_SIZE_SECS: &str = "300";
const MAX_SHOT_ENGINES: u32 = 10;

pub const CREATE_JOB_MUTATION: &str = r#"
mutation createShotDetectionJob($input: CreateJob!) {
  createJob(input: $input) {
    id
  }
}
"#;

pub const ENGINE_RESULTS_QUERY: &str = r#"
query getJobResults($jobId: ID!) {
  engineResults(jobId: $jobId) {
    records {
      jsondata
    }
  }
}
"#;

/// Identifier of a submitted detection job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of one status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    /// No engine results yet
    Pending,
    /// Raw labelled segments in emission order
    Complete(Vec<DetectedSegment>),
}

/// GraphQL request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest<'a> {
    pub query: &'a str,
    pub variables: Value,
}

/// GraphQL response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobData {
    pub create_job: Option<JobRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobRef {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResultsData {
    pub engine_results: Option<EngineResults>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineResults {
    #[serde(default)]
    pub records: Vec<EngineRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineRecord {
    pub jsondata: Option<SeriesDocument>,
}

/// Output-writer document: a flat series of labelled time spans.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeriesDocument {
    #[serde(default)]
    pub series: Vec<SeriesEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesEntry {
    #[serde(deserialize_with = "rounded_millis")]
    pub start_time_ms: i64,
    #[serde(deserialize_with = "rounded_millis")]
    pub stop_time_ms: i64,
    pub object: Option<SeriesObject>,
}

/// Engines may report fractional milliseconds; round to the nearest one.
fn rounded_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let ms = f64::deserialize(deserializer)?;
    if !ms.is_finite() {
        return Err(serde::de::Error::custom("timestamp is not a finite number"));
    }
    // float to int casts saturate
    Ok(ms.round() as i64)
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesObject {
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl EngineResults {
    /// Flatten every record's series into raw segments. Entries without an
    /// object carry no label and cannot be shots, so they are dropped here.
    pub fn segments(&self) -> Vec<DetectedSegment> {
        self.records
            .iter()
            .filter_map(|record| record.jsondata.as_ref())
            .flat_map(|doc| doc.series.iter())
            .filter_map(|entry| {
                entry.object.as_ref().map(|object| {
                    DetectedSegment::new(object.label.clone(), entry.start_time_ms, entry.stop_time_ms)
                })
            })
            .collect()
    }
}

/// `createJob` input: ingest → chunk → shot detection → output writer.
pub fn shot_detection_job_input(source_url: &str) -> Value {
    json!({
        "target": { "status": "downloaded" },
        "tasks": [
            {
                "engineId": INGEST_ENGINE_ID,
                "payload": { "url": source_url },
                "ioFolders": [
                    { "referenceId": "wsaOutput", "mode": "stream", "type": "output" }
                ],
                "executionPreferences": { "priority": TASK_PRIORITY }
            },
            {
                "engineId": CHUNK_ENGINE_ID,
                "payload": {
                    "ffmpegTemplate": "video",
                    "customFFMPEGProperties": { "chunkSizeInSeconds": CHUNK_SIZE_SECS }
                },
                "ioFolders": [
                    { "referenceId": "chunkVideoInput", "mode": "stream", "type": "input" },
                    { "referenceId": "chunkVideoOutput", "mode": "chunk", "type": "output" }
                ],
                "executionPreferences": {
                    "parentCompleteBeforeStarting": true,
                    "priority": TASK_PRIORITY
                }
            },
            {
                "engineId": SHOT_ENGINE_ID,
                "ioFolders": [
                    { "referenceId": "objectInput", "mode": "chunk", "type": "input" },
                    { "referenceId": "objectOutput", "mode": "chunk", "type": "output" }
                ],
                "executionPreferences": {
                    "maxEngines": MAX_SHOT_ENGINES,
                    "parentCompleteBeforeStarting": true,
                    "priority": TASK_PRIORITY
                }
            },
            {
                "engineId": OUTPUT_WRITER_ENGINE_ID,
                "ioFolders": [
                    { "referenceId": "owInput", "mode": "chunk", "type": "input" }
                ],
                "executionPreferences": {
                    "parentCompleteBeforeStarting": true,
                    "priority": TASK_PRIORITY
                }
            }
        ],
        "routes": [
            { "parentIoFolderReferenceId": "wsaOutput", "childIoFolderReferenceId": "chunkVideoInput" },
            { "parentIoFolderReferenceId": "chunkVideoOutput", "childIoFolderReferenceId": "objectInput" },
            { "parentIoFolderReferenceId": "objectOutput", "childIoFolderReferenceId": "owInput" }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_input_carries_source_url() {
        let input = shot_detection_job_input("https://cdn.example/a \"quoted\".mp4");
        assert_eq!(input["tasks"][0]["payload"]["url"], "https://cdn.example/a \"quoted\".mp4");
        assert_eq!(input["tasks"].as_array().unwrap().len(), 4);
        assert_eq!(input["routes"][2]["childIoFolderReferenceId"], "owInput");
    }

    #[test]
    fn test_segments_flatten_records_in_order() {
        let body = r#"{
            "engineResults": {
                "records": [
                    { "jsondata": { "series": [
                        { "startTimeMs": 0, "stopTimeMs": 12000, "object": { "label": "Shot", "type": "shot", "confidence": 1 } },
                        { "startTimeMs": 12000, "stopTimeMs": 13000 }
                    ] } },
                    { "jsondata": null },
                    { "jsondata": { "series": [
                        { "startTimeMs": 13000, "stopTimeMs": 40000, "object": { "label": "Shot" } }
                    ] } }
                ]
            }
        }"#;
        let data: EngineResultsData = serde_json::from_str(body).unwrap();
        let segments = data.engine_results.unwrap().segments();
        assert_eq!(
            segments,
            vec![
                DetectedSegment::new("Shot", 0, 12_000),
                DetectedSegment::new("Shot", 13_000, 40_000),
            ]
        );
    }

    #[test]
    fn test_fractional_timestamps_are_rounded() {
        let body = r#"{ "series": [
            { "startTimeMs": 1000.4, "stopTimeMs": 12999.6, "object": { "label": "Shot" } },
            { "startTimeMs": 13000, "stopTimeMs": 1e30, "object": { "label": "Shot" } }
        ] }"#;
        let doc: SeriesDocument = serde_json::from_str(body).unwrap();
        assert_eq!(doc.series[0].start_time_ms, 1_000);
        assert_eq!(doc.series[0].stop_time_ms, 13_000);
        assert_eq!(doc.series[1].stop_time_ms, i64::MAX);
    }
}
