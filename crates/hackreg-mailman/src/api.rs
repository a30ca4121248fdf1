//! The Mailman admin HTTP API.
//!
//! [`MailmanApi`] abstracts the remote list manager so the audit pass and
//! the queue replay can run against a test double; [`HttpMailman`] is the
//! production client.

use std::{collections::BTreeMap, future::Future};

use hackreg_core::mailinglist::SubscribePolicy;
use serde::Deserialize;

use crate::{Error, Result};

// ─── Wire types ──────────────────────────────────────────────────────────────

/// List metadata as returned by `GET /lists`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteList {
  pub description:             String,
  #[serde(default)]
  pub info:                    String,
  pub advertised:              bool,
  pub subscribe_policy:        u8,
  pub archive_private:         bool,
  #[serde(default)]
  pub subscribe_auto_approval: Vec<String>,
}

impl RemoteList {
  /// Decode the numeric policy the API uses.
  pub fn subscribe_policy(&self) -> Result<SubscribePolicy> {
    match self.subscribe_policy {
      0 => Ok(SubscribePolicy::None),
      1 => Ok(SubscribePolicy::Confirm),
      2 => Ok(SubscribePolicy::RequireApproval),
      3 => Ok(SubscribePolicy::ConfirmAndApprove),
      other => Err(Error::Decode(format!("subscribe_policy {other}"))),
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Operations the engine needs from the remote list manager.
pub trait MailmanApi: Send + Sync {
  /// All lists, keyed by list name.
  fn get_lists(
    &self,
  ) -> impl Future<Output = Result<BTreeMap<String, RemoteList>>> + Send + '_;

  /// Subscribed addresses for one list.
  fn get_list_members<'a>(
    &'a self,
    list_name: &'a str,
  ) -> impl Future<Output = Result<Vec<String>>> + Send + 'a;

  fn subscribe<'a>(
    &'a self,
    list_name: &'a str,
    address: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  fn unsubscribe<'a>(
    &'a self,
    list_name: &'a str,
    address: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// Change an address across every list. Returns whether the remote side
  /// accepted the change.
  fn change_address<'a>(
    &'a self,
    old_address: &'a str,
    new_address: &'a str,
  ) -> impl Future<Output = Result<bool>> + Send + 'a;
}

// ─── HTTP client ─────────────────────────────────────────────────────────────

/// Production client for the Mailman admin API, using HTTP basic auth.
#[derive(Clone)]
pub struct HttpMailman {
  client:   reqwest::Client,
  base_url: String,
  username: String,
  password: String,
}

impl HttpMailman {
  pub fn new(
    base_url: impl Into<String>,
    username: impl Into<String>,
    password: impl Into<String>,
  ) -> Self {
    Self {
      client:   reqwest::Client::new(),
      base_url: base_url.into(),
      username: username.into(),
      password: password.into(),
    }
  }

  fn url(&self, path: &str) -> String {
    format!("{}/{}", self.base_url.trim_end_matches('/'), path)
  }

  fn get(&self, path: &str) -> reqwest::RequestBuilder {
    self
      .client
      .get(self.url(path))
      .basic_auth(&self.username, Some(&self.password))
  }
}

impl MailmanApi for HttpMailman {
  async fn get_lists(&self) -> Result<BTreeMap<String, RemoteList>> {
    let lists = self
      .get("lists")
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;
    Ok(lists)
  }

  async fn get_list_members(&self, list_name: &str) -> Result<Vec<String>> {
    let response = self.get(&format!("lists/{list_name}/members")).send().await?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
      return Err(Error::ListNotFound(list_name.to_owned()));
    }
    Ok(response.error_for_status()?.json().await?)
  }

  async fn subscribe(&self, list_name: &str, address: &str) -> Result<()> {
    self
      .client
      .post(self.url(&format!("lists/{list_name}/members/{address}")))
      .basic_auth(&self.username, Some(&self.password))
      .send()
      .await?
      .error_for_status()?;
    Ok(())
  }

  async fn unsubscribe(&self, list_name: &str, address: &str) -> Result<()> {
    self
      .client
      .delete(self.url(&format!("lists/{list_name}/members/{address}")))
      .basic_auth(&self.username, Some(&self.password))
      .send()
      .await?
      .error_for_status()?;
    Ok(())
  }

  async fn change_address(
    &self,
    old_address: &str,
    new_address: &str,
  ) -> Result<bool> {
    let response = self
      .client
      .post(self.url(&format!("members/{old_address}/change_address")))
      .basic_auth(&self.username, Some(&self.password))
      .json(&serde_json::json!({ "new_address": new_address }))
      .send()
      .await?;

    // 404 means the old address is not known to any list; nothing to do.
    if response.status() == reqwest::StatusCode::NOT_FOUND {
      return Ok(false);
    }
    response.error_for_status()?;
    Ok(true)
  }
}
