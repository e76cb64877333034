use serde::{Deserialize, Serialize};

/// A caller's intent to execute one playbook against a set of documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
  pub playbook_id: String,
  #[serde(default)]
  pub document_ids: Vec<String>,
  /// Overrides the orchestrator's default tenant for this run.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tenant_id: Option<String>,
}

impl RunRequest {
  pub fn new(playbook_id: impl Into<String>) -> Self {
    Self {
      playbook_id: playbook_id.into(),
      document_ids: Vec::new(),
      tenant_id: None,
    }
  }

  pub fn with_documents(mut self, document_ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
    self.document_ids = document_ids.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
    self.tenant_id = Some(tenant_id.into());
    self
  }
}
