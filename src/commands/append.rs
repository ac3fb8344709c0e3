//! The end-to-end append flow shared by `kakeibo append` and the HTTP service:
//! normalize, build the row, find the target row, write it, reply.

use crate::api::{self, Layout, Ledger, Mode};
use crate::args::AppendArgs;
use crate::commands::Out;
use crate::error::{public_message, ErrorType, IntoResult};
use crate::model::{build_row, Amount, Row, Submission};
use crate::{utils, Config, Result};
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

pub(crate) const APPENDED: &str = "追記しました";
pub(crate) const READY: &str = "データを送信してください";

/// The JSON object every caller receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    /// `{ "success": true, "message": "追記しました", "row": 7 }`
    Success {
        success: bool,
        message: String,
        row: u32,
    },
    /// `{ "success": false, "error": "..." }`
    Failure { success: bool, error: String },
    /// `{ "status": "ready", "message": "データを送信してください" }`
    Ready { status: String, message: String },
}

impl Reply {
    pub fn success(row: u32) -> Self {
        Reply::Success {
            success: true,
            message: APPENDED.to_string(),
            row,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Reply::Failure {
            success: false,
            error: error.into(),
        }
    }

    pub fn ready() -> Self {
        Reply::Ready {
            status: "ready".to_string(),
            message: READY.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success { .. })
    }

    /// The error text of a failure reply.
    pub fn error(&self) -> Option<&str> {
        match self {
            Reply::Failure { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"success":false,"error":"Unable to serialize the reply: {e}"}}"#)
        })
    }
}

/// What was written by a successful append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Appended {
    pub(crate) sheet_name: String,
    pub(crate) row_index: u32,
    pub(crate) total: Amount,
    pub(crate) row: Row,
}

/// Appends one submission to its sheet.
pub(crate) async fn append_submission(
    config: &Config,
    mode: Mode,
    submission: &Submission,
) -> Result<Appended> {
    if config.strict_amounts() {
        let invalid = submission.invalid_amounts();
        if !invalid.is_empty() {
            return Err(anyhow!("Invalid amounts: {}", invalid.join(", ")))
                .pub_result(ErrorType::Request);
        }
    }

    let normalized = submission.normalize();
    for name in normalized.categories.unknown_names() {
        debug!("Category '{name}' has no column; it only counts towards the total");
    }
    let row = build_row(
        &submission.payer,
        &submission.date,
        &normalized.categories,
        &submission.memo,
    );
    let sheet_name = submission.sheet_name_or(config.default_sheet_name());

    let sheet = api::sheet(config, mode).await.pub_result(ErrorType::Auth)?;
    let mut ledger = Ledger::new(sheet, Layout::from_config(config));
    let row_index = ledger
        .append(sheet_name, &row)
        .await
        .pub_result(ErrorType::Sheet)?;

    info!(
        "Appended {} for '{}' to '{sheet_name}' row {row_index}",
        normalized.total.to_yen(),
        submission.payer
    );
    Ok(Appended {
        sheet_name: sheet_name.to_string(),
        row_index,
        total: normalized.total,
        row,
    })
}

/// Parses `json` as a submission and appends it. Every outcome becomes a `Reply`.
pub(crate) async fn submit(config: &Config, mode: Mode, json: &str) -> Reply {
    trace!("Submission: {json}");
    let result = match Submission::from_json(json)
        .context("Invalid submission JSON")
        .pub_result(ErrorType::Request)
    {
        Ok(submission) => append_submission(config, mode, &submission).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(appended) => Reply::success(appended.row_index),
        Err(e) => {
            warn!("Append failed: {e:#}");
            Reply::failure(public_message(&e))
        }
    }
}

/// Handles `kakeibo append`: reads the submission from `--data` or `--file` and appends it.
pub async fn append(config: Config, mode: Mode, args: &AppendArgs) -> Result<Out<Reply>> {
    let json = match (args.data(), args.file()) {
        (Some(data), _) => data.to_string(),
        (None, Some(path)) => utils::read(path).await.pub_result(ErrorType::Request)?,
        (None, None) => {
            return Err(anyhow!("Either --data or --file is required")).pub_result(ErrorType::Request)
        }
    };
    let reply = submit(&config, mode, &json).await;
    let message = match &reply {
        Reply::Success { row, .. } => format!("{APPENDED} (row {row})"),
        other => other.error().unwrap_or_default().to_string(),
    };
    Ok(Out::new(message, reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Cell;
    use crate::test::TestEnv;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_submit_appends_after_seed_rows() {
        let env = TestEnv::new().await;
        let json = r#"{"payer":"A","date":"2025/12/4","categories":{"日用品":1100},"memo":"x","sheetName":"2025"}"#;
        let reply = submit(&env.config(), Mode::Testing, json).await;
        assert_eq!(reply, Reply::success(8));

        let state = env.get_state();
        let written = &state["2025"][7];
        assert_eq!(
            &written[1..],
            &[
                "A", "2025/12/4", "1100", "", "", "1000", "100", "", "", "1100", "", "", "", "",
                "", "", "x"
            ]
        );
    }

    #[tokio::test]
    async fn test_submit_uses_default_sheet() {
        let env = TestEnv::new().await;
        let reply = submit(
            &env.config(),
            Mode::Testing,
            r#"{"payer":"B","date":"2026/1/2","categories":{"除外8":108,"除外10":110}}"#,
        )
        .await;
        assert_eq!(reply, Reply::success(5));
        let state = env.get_state();
        let row = &state[env.config().default_sheet_name()][4];
        assert_eq!(row[3], "218");
        assert_eq!(&row[11..15], &["100", "8", "100", "10"]);
        assert_eq!(row[15], "218");
    }

    #[tokio::test]
    async fn test_submit_fills_gap() {
        let env = TestEnv::new().await;
        let mut state = env.get_state();
        state.get_mut("2025").unwrap()[5][2] = String::new();
        env.set_state(state);

        let reply = submit(
            &env.config(),
            Mode::Testing,
            r#"{"payer":"A","date":"2025/12/9","amount":500,"category":"食費","sheetName":"2025"}"#,
        )
        .await;
        assert_eq!(reply, Reply::success(6));
        let state = env.get_state();
        assert_eq!(state["2025"][5][16], "500");
        assert_eq!(state["2025"][5][3], "500");
    }

    #[tokio::test]
    async fn test_submit_malformed_json() {
        let env = TestEnv::new().await;
        let before = env.get_state();
        let reply = submit(&env.config(), Mode::Testing, "{not json").await;
        let error = reply.error().unwrap();
        assert!(error.starts_with("Invalid submission JSON: "), "{error}");
        assert_eq!(env.get_state(), before);
    }

    #[tokio::test]
    async fn test_submit_missing_sheet() {
        let env = TestEnv::new().await;
        let reply = submit(
            &env.config(),
            Mode::Testing,
            r#"{"payer":"A","sheetName":"1999"}"#,
        )
        .await;
        assert!(!reply.is_success());
        assert!(reply.error().unwrap().contains("Sheet '1999' not found"));
    }

    #[tokio::test]
    async fn test_submit_sparse_submission_still_appends() {
        let env = TestEnv::new().await;
        let reply = submit(&env.config(), Mode::Testing, r#"{"sheetName":"2025"}"#).await;
        // An entry with no date leaves the date cell empty, so the row is reused next time.
        assert_eq!(reply, Reply::success(8));
        let state = env.get_state();
        assert_eq!(state["2025"][7][3], "0");
    }

    #[tokio::test]
    async fn test_strict_amounts_rejects_garbage() {
        let env = TestEnv::new().await;
        let mut config = env.config();
        config.set_strict_amounts(true);
        let before = env.get_state();

        let json = r#"{"payer":"A","date":"2025/12/4","categories":{"食費":"たくさん"},"sheetName":"2025"}"#;
        let reply = submit(&config, Mode::Testing, json).await;
        assert_eq!(
            reply.error(),
            Some("Invalid amounts: 食費: 'たくさん' is not a number")
        );
        assert_eq!(env.get_state(), before);

        // The lenient default counts it as zero and appends.
        let reply = submit(&env.config(), Mode::Testing, json).await;
        assert!(reply.is_success());
    }

    #[tokio::test]
    async fn test_append_submission_returns_row() {
        let env = TestEnv::new().await;
        let submission =
            Submission::from_json(r#"{"payer":"A","date":"d","categories":{"外食全員":3000}}"#)
                .unwrap();
        let appended = append_submission(&env.config(), Mode::Testing, &submission)
            .await
            .unwrap();
        assert_eq!(appended.row_index, 5);
        assert_eq!(appended.total, Amount::from(3000_i64));
        assert_eq!(appended.sheet_name, env.config().default_sheet_name());
        assert!(matches!(appended.row.get(3), Some(Cell::Number(_))));
    }

    #[tokio::test]
    async fn test_append_from_file() {
        let env = TestEnv::new().await;
        let path = env.config().root().join("entry.json");
        utils::write(&path, r#"{"payer":"A","date":"2025/12/5","sheetName":"2025"}"#)
            .await
            .unwrap();
        let out = append(env.config(), Mode::Testing, &AppendArgs::new(None, Some(path)))
            .await
            .unwrap();
        assert_eq!(out.structure(), Some(&Reply::success(8)));
        assert_eq!(out.message(), "追記しました (row 8)");
    }

    #[tokio::test]
    async fn test_append_needs_input() {
        let env = TestEnv::new().await;
        let e = append(env.config(), Mode::Testing, &AppendArgs::new(None, None::<PathBuf>))
            .await
            .unwrap_err();
        assert!(format!("{e:#}").contains("Either --data or --file is required"));
    }

    #[test]
    fn test_reply_json() {
        assert_eq!(
            Reply::success(7).to_json(),
            r#"{"success":true,"message":"追記しました","row":7}"#
        );
        assert_eq!(
            Reply::failure("boom").to_json(),
            r#"{"success":false,"error":"boom"}"#
        );
        assert_eq!(
            Reply::ready().to_json(),
            r#"{"status":"ready","message":"データを送信してください"}"#
        );
    }

    #[test]
    fn test_reply_parses_back() {
        let reply: Reply = serde_json::from_str(r#"{"success":false,"error":"x"}"#).unwrap();
        assert_eq!(reply, Reply::failure("x"));
    }
}
