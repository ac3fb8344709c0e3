//! Implements the `Sheet` trait using the `sheets::Client` to interact with a Google sheet.

use crate::api::a1::{column_range, row_range, sheet_range};
use crate::api::{Sheet, TokenProvider};
use crate::{Config, Result};
use anyhow::Context;
use sheets::types::{
    BatchUpdateValuesRequest, DateTimeRenderOption, Dimension, ValueInputOption, ValueRange,
    ValueRenderOption,
};
use sheets::ClientError;
use tracing::trace;

/// Implements the `Sheet` trait using the `sheets::Client` to interact with a Google sheet. It
/// takes a `TokenProvider`, on which it calls refresh to keep the token up-to-date.
pub(super) struct GoogleSheet {
    config: Config,
    token_provider: TokenProvider,
    client: sheets::Client,
}

impl GoogleSheet {
    pub(super) async fn new(config: Config, mut token_provider: TokenProvider) -> Result<Self> {
        let client = create_sheets_client(&mut token_provider).await?;
        Ok(Self {
            config,
            token_provider,
            client,
        })
    }

    /// Refreshes the sheets client with a new access token if needed
    async fn refresh_client(&mut self) -> Result<()> {
        self.client = create_sheets_client(&mut self.token_provider).await?;
        Ok(())
    }

    /// Reads `range` as formatted strings, row by row. The API leaves out trailing empty rows and
    /// trailing empty cells within a row.
    async fn get_values(&mut self, range: &str) -> Result<Vec<Vec<String>>> {
        self.refresh_client().await?;
        let response = self
            .client
            .spreadsheets()
            .values_get(
                self.config.spreadsheet_id(),
                range,
                DateTimeRenderOption::FormattedString,
                Dimension::Rows,
                ValueRenderOption::FormattedValue,
            )
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to fetch {range}"))?;
        Ok(response.body.values)
    }
}

#[async_trait::async_trait]
impl Sheet for GoogleSheet {
    async fn read_column(
        &mut self,
        sheet_name: &str,
        column: u32,
        row_start: u32,
    ) -> Result<Vec<String>> {
        let range = column_range(sheet_name, column, row_start);
        trace!("read_column {range}");
        let mut cells: Vec<String> = self
            .get_values(&range)
            .await?
            .into_iter()
            .map(|row| row.into_iter().next().unwrap_or_default())
            .collect();

        // Empty cells below the last date but above the last row still count as gaps.
        let last = self.last_row(sheet_name).await?;
        let extent = (last + 1).saturating_sub(row_start) as usize;
        if cells.len() < extent {
            cells.resize(extent, String::new());
        }
        Ok(cells)
    }

    async fn last_row(&mut self, sheet_name: &str) -> Result<u32> {
        trace!("last_row for {sheet_name}");
        let rows = self.get_values(&sheet_range(sheet_name)).await?;
        Ok(rows.len() as u32)
    }

    async fn write_row(
        &mut self,
        sheet_name: &str,
        row: u32,
        start_column: u32,
        values: &[String],
    ) -> Result<()> {
        let range = row_range(sheet_name, row, start_column, values.len());
        trace!("write_row {range}");
        self.refresh_client().await?;

        let request = BatchUpdateValuesRequest {
            data: vec![ValueRange {
                major_dimension: Some(Dimension::Rows),
                range: range.clone(),
                values: vec![values.to_vec()],
            }],
            include_values_in_response: Some(false),
            response_date_time_render_option: None,
            response_value_render_option: None,
            value_input_option: Some(ValueInputOption::UserEntered),
        };

        self.client
            .spreadsheets()
            .values_batch_update(self.config.spreadsheet_id(), &request)
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to write {range}"))?;
        Ok(())
    }
}

/// Creates a new sheets client with a refreshed access token.
async fn create_sheets_client(token_provider: &mut TokenProvider) -> Result<sheets::Client> {
    let access_token = token_provider.token_with_refresh().await?;

    // Only the access token is used for API calls; refresh is handled by the TokenProvider.
    Ok(sheets::Client::new(
        String::new(),
        String::new(),
        String::new(),
        access_token,
        String::new(),
    ))
}

fn map_client_error(e: ClientError) -> anyhow::Error {
    let error_name = match &e {
        ClientError::EmptyRefreshToken => "EmptyRefreshToken".to_string(),
        ClientError::FromUtf8Error(inner) => format!("FromUtf8Error {inner}"),
        ClientError::UrlParserError(inner) => format!("UrlParserError {inner}"),
        ClientError::SerdeJsonError(inner) => format!("SerdeJsonError {inner}"),
        ClientError::ReqwestError(inner) => format!("ReqwestError {inner}"),
        ClientError::InvalidHeaderValue(inner) => format!("InvalidHeaderValue {inner}"),
        ClientError::ReqwestMiddleWareError(inner) => format!("ReqwestMiddleWareError {inner}"),
        ClientError::HttpError { .. } => "HttpError".to_string(),
        ClientError::Other(_) => "Other".to_string(),
    };
    anyhow::Error::new(e).context(error_name)
}
