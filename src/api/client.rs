use async_trait::async_trait;
use color_eyre::{
  eyre::{eyre, Report},
  Result,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::SyncError;

use super::types::{
  unwrap_data, Application, ApplicationCount, AttendanceRecord, AttendanceSubmission, Education,
  Experience, Hotel, Id, Job, LoginResponse, Profile, Skill,
};

/// Generic JSON request function.
///
/// Implementations resolve to the response body, or fail with a
/// `SyncError::Transport` / `SyncError::Status` for network errors and non-2xx
/// responses.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn request(
    &self,
    method: Method,
    url: Url,
    bearer: Option<&str>,
    body: Option<Value>,
  ) -> Result<Value>;
}

/// `Transport` over reqwest.
#[derive(Clone, Default)]
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn request(
    &self,
    method: Method,
    url: Url,
    bearer: Option<&str>,
    body: Option<Value>,
  ) -> Result<Value> {
    let url_text = url.to_string();
    let mut request = self
      .client
      .request(method.clone(), url)
      .header(reqwest::header::ACCEPT, "application/json");

    if let Some(token) = bearer {
      request = request.bearer_auth(token);
    }
    if let Some(body) = body {
      request = request.json(&body);
    }

    let response = request
      .send()
      .await
      .map_err(|e| Report::new(SyncError::Transport(e.to_string())))?;

    let status = response.status();
    debug!(%method, url = %url_text, status = status.as_u16(), "api response");

    if !status.is_success() {
      return Err(Report::new(SyncError::Status {
        url: url_text,
        status: status.as_u16(),
      }));
    }

    let bytes = response
      .bytes()
      .await
      .map_err(|e| Report::new(SyncError::Transport(e.to_string())))?;

    if bytes.is_empty() {
      return Ok(Value::Null);
    }

    serde_json::from_slice(&bytes).map_err(|e| {
      Report::new(SyncError::Decode {
        what: url_text,
        reason: e.to_string(),
      })
    })
  }
}

/// Worker API endpoints.
#[derive(Clone)]
pub struct ApiClient {
  transport: Arc<dyn Transport>,
  api_url: String,
}

impl ApiClient {
  pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Self {
    Self {
      transport,
      api_url: config.api.api_url.trim_end_matches('/').to_string(),
    }
  }

  fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/{}", self.api_url, path.trim_start_matches('/')))
      .map_err(|e| eyre!("Invalid API url for {}: {}", path, e))?;
    if !query.is_empty() {
      url
        .query_pairs_mut()
        .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
    }
    Ok(url)
  }

  async fn get<T: DeserializeOwned>(
    &self,
    path: &str,
    token: &str,
    query: &[(&str, String)],
  ) -> Result<T> {
    let url = self.url(path, query)?;
    let value = self
      .transport
      .request(Method::GET, url, Some(token), None)
      .await?;
    decode(path, value)
  }

  /// List endpoint; a null body or null `data` decodes as empty.
  async fn get_list<T: DeserializeOwned>(
    &self,
    path: &str,
    token: &str,
    query: &[(&str, String)],
  ) -> Result<Vec<T>> {
    let items: Option<Vec<T>> = self.get(path, token, query).await?;
    Ok(items.unwrap_or_default())
  }

  async fn post(&self, path: &str, token: Option<&str>, body: Value) -> Result<Value> {
    let url = self.url(path, &[])?;
    self
      .transport
      .request(Method::POST, url, token, Some(body))
      .await
  }

  pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
    let value = self
      .post(
        "auth/login",
        None,
        json!({ "email": email, "password": password }),
      )
      .await?;
    decode("auth/login", value)
  }

  pub async fn profile(&self, token: &str) -> Result<Profile> {
    self.get("worker/profile", token, &[]).await
  }

  /// All jobs, optionally narrowed by server-side filter parameters.
  pub async fn jobs(&self, token: &str, query: &[(&str, String)]) -> Result<Vec<Job>> {
    self.get_list("worker/jobs", token, query).await
  }

  pub async fn popular_jobs(&self, token: &str) -> Result<Vec<Job>> {
    self.get_list("worker/jobs/popular", token, &[]).await
  }

  pub async fn hotels(&self, token: &str) -> Result<Vec<Hotel>> {
    self.get_list("worker/hotels", token, &[]).await
  }

  pub async fn applications(&self, token: &str) -> Result<Vec<Application>> {
    self.get_list("worker/applications", token, &[]).await
  }

  pub async fn application_counts(&self, token: &str) -> Result<Vec<ApplicationCount>> {
    self.get_list("worker/applications/counts", token, &[]).await
  }

  pub async fn attendances(&self, token: &str) -> Result<Vec<AttendanceRecord>> {
    self.get_list("worker/attendance", token, &[]).await
  }

  pub async fn submit_attendance(&self, token: &str, submission: &AttendanceSubmission) -> Result<()> {
    let body = serde_json::to_value(submission)
      .map_err(|e| eyre!("Failed to serialize attendance: {}", e))?;
    self.post("worker/attendance", Some(token), body).await?;
    Ok(())
  }

  pub async fn all_skills(&self, token: &str) -> Result<Vec<Skill>> {
    self.get_list("worker/skills", token, &[]).await
  }

  pub async fn my_skills(&self, token: &str) -> Result<Vec<Skill>> {
    self.get_list("worker/my-skills", token, &[]).await
  }

  /// Replace the worker's skills. Numeric ids are sent as numbers.
  pub async fn save_skills(&self, token: &str, skill_ids: &[Id]) -> Result<()> {
    let ids: Vec<Value> = skill_ids
      .iter()
      .map(|id| {
        id.as_str()
          .parse::<u64>()
          .map(Value::from)
          .unwrap_or_else(|_| Value::from(id.as_str()))
      })
      .collect();
    self
      .post("worker/skills", Some(token), json!({ "skill_ids": ids }))
      .await?;
    Ok(())
  }

  pub async fn experiences(&self, token: &str) -> Result<Vec<Experience>> {
    self.get_list("worker/experiences", token, &[]).await
  }

  pub async fn save_experience(&self, token: &str, experience: &Experience) -> Result<()> {
    let body = serde_json::to_value(experience)
      .map_err(|e| eyre!("Failed to serialize experience: {}", e))?;
    self.post("worker/experience", Some(token), body).await?;
    Ok(())
  }

  pub async fn educations(&self, token: &str) -> Result<Vec<Education>> {
    self.get_list("worker/educations", token, &[]).await
  }

  pub async fn save_education(&self, token: &str, education: &Education) -> Result<()> {
    let body = serde_json::to_value(education)
      .map_err(|e| eyre!("Failed to serialize education: {}", e))?;
    self.post("worker/education", Some(token), body).await?;
    Ok(())
  }
}

/// Decode a response body, unwrapping a `data` envelope.
fn decode<T: DeserializeOwned>(what: &str, value: Value) -> Result<T> {
  serde_json::from_value(unwrap_data(value)).map_err(|e| {
    Report::new(SyncError::Decode {
      what: what.to_string(),
      reason: e.to_string(),
    })
  })
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use std::collections::VecDeque;
  use std::sync::Mutex;

  /// Records requests and replays canned responses in order.
  #[derive(Default)]
  pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Value>>>,
    pub requests: Mutex<Vec<(Method, String, Option<String>, Option<Value>)>>,
  }

  impl ScriptedTransport {
    pub fn new() -> Self {
      Self::default()
    }

    pub fn push_ok(&self, value: Value) {
      self.responses.lock().unwrap().push_back(Ok(value));
    }

    pub fn push_err(&self, error: SyncError) {
      self.responses.lock().unwrap().push_back(Err(Report::new(error)));
    }

    pub fn request_count(&self) -> usize {
      self.requests.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
      self
        .requests
        .lock()
        .unwrap()
        .iter()
        .map(|(_, url, _, _)| url.clone())
        .collect()
    }
  }

  #[async_trait]
  impl Transport for ScriptedTransport {
    async fn request(
      &self,
      method: Method,
      url: Url,
      bearer: Option<&str>,
      body: Option<Value>,
    ) -> Result<Value> {
      self
        .requests
        .lock()
        .unwrap()
        .push((method, url.to_string(), bearer.map(String::from), body));
      self
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(Report::new(SyncError::Transport("no scripted response".into()))))
    }
  }

  pub(crate) fn test_config() -> Config {
    Config::from_yaml(
      r#"
api:
  api_url: http://api.test/api/
  base_url: http://api.test
  ws_url: ws://api.test/ws
"#,
    )
    .unwrap()
  }

  #[tokio::test]
  async fn test_skills_envelope_unwrapped() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_ok(json!({"data": [{"id": 1, "name": "Barista", "category": "F&B"}]}));
    let client = ApiClient::new(&test_config(), transport.clone());

    let skills = client.all_skills("t").await.unwrap();
    assert_eq!(skills.len(), 1);
    assert_eq!(skills[0].name, "Barista");

    let requests = transport.requests.lock().unwrap();
    assert_eq!(requests[0].1, "http://api.test/api/worker/skills");
    assert_eq!(requests[0].2.as_deref(), Some("t"));
  }

  #[tokio::test]
  async fn test_null_list_body_is_empty() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_ok(Value::Null);
    let client = ApiClient::new(&test_config(), transport);

    assert!(client.attendances("t").await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_query_parameters_encoded() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_ok(json!([]));
    let client = ApiClient::new(&test_config(), transport.clone());

    client
      .jobs("t", &[("category", "Room Attendant".to_string())])
      .await
      .unwrap();

    assert_eq!(
      transport.urls()[0],
      "http://api.test/api/worker/jobs?category=Room+Attendant"
    );
  }

  #[tokio::test]
  async fn test_numeric_skill_ids_posted_as_numbers() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_ok(Value::Null);
    let client = ApiClient::new(&test_config(), transport.clone());

    client
      .save_skills("t", &[Id::from(3), Id::from("x-1")])
      .await
      .unwrap();

    let requests = transport.requests.lock().unwrap();
    assert_eq!(requests[0].0, Method::POST);
    assert_eq!(requests[0].3, Some(json!({"skill_ids": [3, "x-1"]})));
  }

  #[tokio::test]
  async fn test_decode_failure_is_classified() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_ok(json!({"unexpected": true}));
    let client = ApiClient::new(&test_config(), transport);

    let err = client.jobs("t", &[]).await.unwrap_err();
    assert!(matches!(
      err.downcast_ref::<SyncError>(),
      Some(SyncError::Decode { .. })
    ));
  }
}
