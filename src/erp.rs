//! Endpoint helpers for the ERP modules (procurement, inventory, production,
//! sales, quality, reports).

use serde_json::Value;
use url::form_urlencoded;

use crate::cache::KvStore;
use crate::error::DataError;
use crate::manager::{DataManager, MutationOutcome};
use crate::transport::Transport;

pub const PURCHASE_ORDERS: &str = "/procurement/purchase-orders";
pub const MATERIALS: &str = "/inventory/materials";
pub const WORK_ORDERS: &str = "/production/work-orders";
pub const CUSTOMERS: &str = "/sales/customers";
pub const SALES_ORDERS: &str = "/sales/orders";
pub const QUALITY_LOGS: &str = "/quality/logs";

/// Short names accepted wherever an endpoint is expected.
const RESOURCES: &[(&str, &str)] = &[
  ("purchase-orders", PURCHASE_ORDERS),
  ("po", PURCHASE_ORDERS),
  ("materials", MATERIALS),
  ("inventory", MATERIALS),
  ("work-orders", WORK_ORDERS),
  ("wo", WORK_ORDERS),
  ("customers", CUSTOMERS),
  ("sales-orders", SALES_ORDERS),
  ("orders", SALES_ORDERS),
  ("quality-logs", QUALITY_LOGS),
  ("qc", QUALITY_LOGS),
];

/// Endpoint for a report type, e.g. `/reports/inventory`.
pub fn report_endpoint(report_type: &str) -> String {
  format!("/reports/{}", report_type)
}

/// Append `filters` to `path` as a query string. No filters, no `?`.
pub fn with_query(path: &str, filters: &[(&str, &str)]) -> String {
  if filters.is_empty() {
    return path.to_string();
  }

  let query = form_urlencoded::Serializer::new(String::new())
    .extend_pairs(filters)
    .finish();
  format!("{}?{}", path, query)
}

/// Resolve user input to an endpoint.
///
/// Paths starting with `/` pass through. Otherwise the first segment may be a
/// short resource name (`materials`, `po/PO-12`) or `report/<type>`.
pub fn resolve_endpoint(input: &str) -> String {
  let input = input.trim();
  if input.starts_with('/') {
    return input.to_string();
  }

  let (head, rest) = match input.find(|c: char| c == '/' || c == '?') {
    Some(idx) => input.split_at(idx),
    None => (input, ""),
  };
  let head_lower = head.to_lowercase();

  if head_lower == "report" || head_lower == "reports" {
    return format!("/reports{}", rest);
  }

  match RESOURCES.iter().find(|(name, _)| *name == head_lower) {
    Some((_, path)) => format!("{}{}", path, rest),
    None => format!("/{}", input),
  }
}

/// Typed access to the ERP resources through a [`DataManager`].
pub struct ErpApi<T: Transport, S: KvStore> {
  manager: DataManager<T, S>,
}

impl<T: Transport, S: KvStore + 'static> ErpApi<T, S> {
  pub fn new(manager: DataManager<T, S>) -> Self {
    Self { manager }
  }

  pub fn manager(&self) -> &DataManager<T, S> {
    &self.manager
  }

  pub async fn purchase_orders(&self, filters: &[(&str, &str)]) -> Result<Value, DataError> {
    self
      .manager
      .read(&with_query(PURCHASE_ORDERS, filters), true)
      .await
  }

  pub async fn create_purchase_order(&self, order: Value) -> Result<MutationOutcome, DataError> {
    self.manager.create(PURCHASE_ORDERS, order).await
  }

  pub async fn inventory(&self, filters: &[(&str, &str)]) -> Result<Value, DataError> {
    self.manager.read(&with_query(MATERIALS, filters), true).await
  }

  pub async fn work_orders(&self, filters: &[(&str, &str)]) -> Result<Value, DataError> {
    self
      .manager
      .read(&with_query(WORK_ORDERS, filters), true)
      .await
  }

  pub async fn create_work_order(&self, order: Value) -> Result<MutationOutcome, DataError> {
    self.manager.create(WORK_ORDERS, order).await
  }

  pub async fn customers(&self, filters: &[(&str, &str)]) -> Result<Value, DataError> {
    self.manager.read(&with_query(CUSTOMERS, filters), true).await
  }

  pub async fn create_customer(&self, customer: Value) -> Result<MutationOutcome, DataError> {
    self.manager.create(CUSTOMERS, customer).await
  }

  pub async fn sales_orders(&self, filters: &[(&str, &str)]) -> Result<Value, DataError> {
    self
      .manager
      .read(&with_query(SALES_ORDERS, filters), true)
      .await
  }

  pub async fn quality_logs(&self, filters: &[(&str, &str)]) -> Result<Value, DataError> {
    self
      .manager
      .read(&with_query(QUALITY_LOGS, filters), true)
      .await
  }

  pub async fn log_quality_check(&self, check: Value) -> Result<MutationOutcome, DataError> {
    self.manager.create(QUALITY_LOGS, check).await
  }

  pub async fn report(
    &self,
    report_type: &str,
    filters: &[(&str, &str)],
  ) -> Result<Value, DataError> {
    self
      .manager
      .read(&with_query(&report_endpoint(report_type), filters), true)
      .await
  }
}
