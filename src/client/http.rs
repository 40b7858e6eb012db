//! Milvus RESTful v2 binding.
//!
//! The REST surface is stateless, so a "session" here is the resolved base
//! URL plus bearer token, registered under the caller's alias once the server
//! has answered an authenticated request.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::config::{IndexParams, SearchParam};
use crate::error::{Result, SimilarityError};
use crate::types::{
    CollectionSchema, ConsistencyLevel, DataType, FieldSchema, InsertColumns, SearchHit,
    PK_FIELD,
};

use super::{Expr, QueryRow, RemoteClient, SearchRequest};

#[derive(Debug, Clone)]
struct HttpSession {
    base_url: String,
    token: Option<String>,
}

/// Response envelope shared by every v2 endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct HasResponse {
    has: bool,
}

#[derive(Debug, Deserialize)]
struct DescribeResponse {
    #[serde(default)]
    fields: Vec<DescribeField>,
}

#[derive(Debug, Deserialize)]
struct DescribeField {
    name: String,
    #[serde(rename = "type")]
    data_type: String,
    #[serde(default, rename = "primaryKey")]
    primary_key: bool,
    #[serde(default, rename = "autoId")]
    auto_id: bool,
    #[serde(default)]
    params: Vec<DescribeParam>,
}

#[derive(Debug, Deserialize)]
struct DescribeParam {
    key: String,
    value: Value,
}

impl DescribeParam {
    /// Numeric params come back either as numbers or as strings.
    fn as_usize(&self) -> Option<usize> {
        match &self.value {
            Value::Number(n) => n.as_u64().map(|n| n as usize),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    #[serde(rename = "rowCount")]
    row_count: u64,
}

#[derive(Debug, Deserialize)]
struct InsertResponse {
    #[serde(default, rename = "insertCount")]
    insert_count: usize,
}

fn parse_field(field: DescribeField) -> Result<FieldSchema> {
    let param = |key: &str| {
        field
            .params
            .iter()
            .find(|p| p.key == key)
            .and_then(DescribeParam::as_usize)
    };
    let data_type = match field.data_type.as_str() {
        "VarChar" => DataType::VarChar,
        "FloatVector" => DataType::FloatVector,
        other => {
            return Err(SimilarityError::Schema(format!(
                "unexpected type {other} for field {}",
                field.name
            )))
        }
    };
    Ok(FieldSchema {
        max_length: param("max_length"),
        dim: param("dim"),
        name: field.name,
        data_type,
        is_primary: field.primary_key,
        auto_id: field.auto_id,
    })
}

fn field_json(field: &FieldSchema) -> Value {
    let data_type = match field.data_type {
        DataType::VarChar => "VarChar",
        DataType::FloatVector => "FloatVector",
    };
    let mut params = serde_json::Map::new();
    if let Some(len) = field.max_length {
        params.insert("max_length".to_string(), json!(len));
    }
    if let Some(dim) = field.dim {
        params.insert("dim".to_string(), json!(dim));
    }
    json!({
        "fieldName": field.name,
        "dataType": data_type,
        "isPrimary": field.is_primary,
        "elementTypeParams": params,
    })
}

fn search_params_json(param: &SearchParam) -> Value {
    json!({
        "metricType": param.metric_type,
        "params": param.params,
    })
}

/// HTTP client for a Milvus server, holding one session per alias.
pub struct HttpClient {
    http: reqwest::Client,
    sessions: DashMap<String, HttpSession>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            sessions: DashMap::new(),
        }
    }

    fn session(&self, alias: &str) -> Result<HttpSession> {
        self.sessions
            .get(alias)
            .map(|s| s.value().clone())
            .ok_or_else(|| {
                SimilarityError::Remote(format!("should create connection first: {alias}"))
            })
    }

    async fn post_raw(&self, session: &HttpSession, path: &str, body: &Value) -> Result<Value> {
        let mut req = self
            .http
            .post(format!("{}/v2/vectordb/{path}", session.base_url))
            .json(body);
        if let Some(token) = &session.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SimilarityError::Remote(format!(
                "{path} failed ({status}): {text}"
            )));
        }

        let envelope: Envelope = resp.json().await?;
        if envelope.code != 0 {
            return Err(SimilarityError::Remote(format!(
                "{path} failed (code {}): {}",
                envelope.code, envelope.message
            )));
        }
        Ok(envelope.data)
    }

    async fn post<T: DeserializeOwned>(&self, alias: &str, path: &str, body: Value) -> Result<T> {
        let session = self.session(alias)?;
        let data = self.post_raw(&session, path, &body).await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn post_unit(&self, alias: &str, path: &str, body: Value) -> Result<()> {
        let session = self.session(alias)?;
        self.post_raw(&session, path, &body).await.map(|_| ())
    }
}

#[async_trait]
impl RemoteClient for HttpClient {
    #[instrument(skip(self, password))]
    async fn connect(&self, alias: &str, uri: &str, user: &str, password: &str) -> Result<()> {
        let session = HttpSession {
            base_url: uri.trim_end_matches('/').to_string(),
            token: (!user.is_empty()).then(|| format!("{user}:{password}")),
        };
        self.post_raw(&session, "collections/list", &json!({})).await?;
        self.sessions.insert(alias.to_string(), session);
        Ok(())
    }

    async fn disconnect(&self, alias: &str) -> Result<()> {
        self.sessions.remove(alias);
        Ok(())
    }

    async fn has_collection(&self, alias: &str, name: &str) -> Result<bool> {
        let resp: HasResponse = self
            .post(alias, "collections/has", json!({ "collectionName": name }))
            .await?;
        Ok(resp.has)
    }

    async fn create_collection(
        &self,
        alias: &str,
        name: &str,
        schema: &CollectionSchema,
        consistency: ConsistencyLevel,
    ) -> Result<()> {
        let fields: Vec<Value> = schema.fields.iter().map(field_json).collect();
        let auto_id = schema.primary_field().is_some_and(|f| f.auto_id);
        self.post_unit(
            alias,
            "collections/create",
            json!({
                "collectionName": name,
                "schema": { "autoId": auto_id, "fields": fields },
                "params": { "consistencyLevel": consistency.to_string() },
            }),
        )
        .await
    }

    async fn describe_collection(&self, alias: &str, name: &str) -> Result<CollectionSchema> {
        let resp: DescribeResponse = self
            .post(alias, "collections/describe", json!({ "collectionName": name }))
            .await?;
        let fields = resp
            .fields
            .into_iter()
            .map(parse_field)
            .collect::<Result<Vec<_>>>()?;
        Ok(CollectionSchema { fields })
    }

    async fn create_index(
        &self,
        alias: &str,
        name: &str,
        field: &str,
        params: &IndexParams,
    ) -> Result<()> {
        self.post_unit(
            alias,
            "indexes/create",
            json!({
                "collectionName": name,
                "indexParams": [{
                    "fieldName": field,
                    "indexName": field,
                    "metricType": params.metric_type,
                    "indexType": params.index_type,
                    "params": params.params,
                }],
            }),
        )
        .await
    }

    async fn load_collection(&self, alias: &str, name: &str) -> Result<()> {
        self.post_unit(alias, "collections/load", json!({ "collectionName": name }))
            .await
    }

    async fn drop_collection(&self, alias: &str, name: &str) -> Result<()> {
        self.post_unit(alias, "collections/drop", json!({ "collectionName": name }))
            .await
    }

    async fn insert(&self, alias: &str, name: &str, columns: InsertColumns) -> Result<usize> {
        let rows = columns.into_records();
        let resp: InsertResponse = self
            .post(
                alias,
                "entities/insert",
                json!({ "collectionName": name, "data": rows }),
            )
            .await?;
        Ok(resp.insert_count)
    }

    async fn delete(&self, alias: &str, name: &str, expr: &Expr) -> Result<()> {
        self.post_unit(
            alias,
            "entities/delete",
            json!({ "collectionName": name, "filter": expr.to_string() }),
        )
        .await
    }

    async fn query(
        &self,
        alias: &str,
        name: &str,
        expr: &Expr,
        output_fields: &[&str],
    ) -> Result<Vec<QueryRow>> {
        let mut body = json!({
            "collectionName": name,
            "filter": expr.to_string(),
            "outputFields": output_fields,
        });
        // Unbounded queries are rejected; an `in` filter caps the result size.
        if !expr.values().is_empty() && expr.field() == PK_FIELD {
            body["limit"] = json!(expr.values().len());
        }
        self.post(alias, "entities/query", body).await
    }

    async fn search(
        &self,
        alias: &str,
        name: &str,
        request: SearchRequest<'_>,
    ) -> Result<Vec<SearchHit>> {
        let mut body = json!({
            "collectionName": name,
            "data": [request.vector],
            "annsField": request.anns_field,
            "limit": request.limit,
            "outputFields": [PK_FIELD],
            "searchParams": search_params_json(request.param),
        });
        if let Some(expr) = request.expr {
            body["filter"] = json!(expr.to_string());
        }

        let rows: Vec<Value> = self.post(alias, "entities/search", body).await?;
        rows.into_iter()
            .map(|row| {
                let id = row
                    .get(PK_FIELD)
                    .or_else(|| row.get("id"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        SimilarityError::Remote("search hit without primary key".to_string())
                    })?;
                let score = row.get("distance").and_then(Value::as_f64).unwrap_or(0.0);
                Ok(SearchHit {
                    id: id.to_string(),
                    score: score as f32,
                })
            })
            .collect()
    }

    async fn flush(&self, alias: &str, name: &str) -> Result<()> {
        // Flush is not exposed over REST; row counts come from get_stats.
        self.session(alias)?;
        debug!(collection = name, "flush is a no-op over REST");
        Ok(())
    }

    async fn num_entities(&self, alias: &str, name: &str) -> Result<u64> {
        let resp: StatsResponse = self
            .post(alias, "collections/get_stats", json!({ "collectionName": name }))
            .await?;
        Ok(resp.row_count)
    }
}
