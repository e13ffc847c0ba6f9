//! Resource for any action whose records are a repeated element.

use std::time::Duration;

use super::{ActionPair, PagedResource};
use crate::{
    error::Result,
    reliability::ThrottleConfig,
    request::ApiSection,
    signing::Parameters,
    xml::XmlNode,
};

/// Lists the elements found at a path inside each `{Action}Result`.
///
/// Works for any list operation without a dedicated mapper; records are
/// returned as raw [`XmlNode`] trees.
///
/// # Examples
///
/// ```
/// use mws_client::{
///     pagination::{ElementList, PagedResource},
///     request::ApiSection,
///     signing::Parameters,
///     xml::XmlNode,
/// };
///
/// let mut orders = ElementList::new(
///     "ListOrders",
///     ApiSection::orders(),
///     Parameters::new().with("CreatedAfter", "2024-01-01T00:00:00Z"),
///     "Orders/Order",
/// );
/// let result = XmlNode::parse(
///     "<ListOrdersResult><Orders><Order/><Order/></Orders></ListOrdersResult>",
/// ).unwrap();
/// assert_eq!(orders.parse_page(&result).unwrap().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ElementList {
    actions: ActionPair,
    section: ApiSection,
    params: Parameters,
    record_path: String,
    throttle: ThrottleConfig,
}

impl ElementList {
    /// Lists `record_path` elements returned by `action` and its
    /// `ByNextToken` continuation.
    #[must_use]
    pub fn new(
        action: &str,
        section: ApiSection,
        params: Parameters,
        record_path: impl Into<String>,
    ) -> Self {
        Self {
            throttle: ThrottleConfig::new(action, Duration::from_secs(60)),
            actions: ActionPair::new(action),
            section,
            params,
            record_path: record_path.into(),
        }
    }

    /// Overrides the continuation action name.
    #[must_use]
    pub fn with_actions(mut self, actions: ActionPair) -> Self {
        self.actions = actions;
        self
    }

    /// Overrides the throttle settings.
    #[must_use]
    pub fn with_throttle(mut self, throttle: ThrottleConfig) -> Self {
        self.throttle = throttle;
        self
    }

    /// Element path of one record, relative to the result element.
    #[must_use]
    pub fn record_path(&self) -> &str {
        &self.record_path
    }
}

impl PagedResource for ElementList {
    type Record = XmlNode;

    fn actions(&self) -> ActionPair {
        self.actions.clone()
    }

    fn section(&self) -> ApiSection {
        self.section.clone()
    }

    fn parameters(&self) -> Parameters {
        self.params.clone()
    }

    fn throttle(&self) -> ThrottleConfig {
        self.throttle.clone()
    }

    fn parse_page(&mut self, result: &XmlNode) -> Result<Vec<XmlNode>> {
        Ok(result.find_all(&self.record_path).into_iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_actions_and_throttle() {
        let list = ElementList::new("ListInventorySupply", ApiSection::inventory(), Parameters::new(), "InventorySupplyList/member");
        assert_eq!(list.actions().next(), "ListInventorySupplyByNextToken");
        assert_eq!(list.throttle().group(), "ListInventorySupply");
        assert_eq!(list.record_path(), "InventorySupplyList/member");
    }

    #[test]
    fn test_parse_page_missing_path_is_empty() {
        let mut list =
            ElementList::new("ListOrders", ApiSection::orders(), Parameters::new(), "Orders/Order");
        let result = XmlNode::parse("<ListOrdersResult><NextToken>t</NextToken></ListOrdersResult>").unwrap();
        assert!(list.parse_page(&result).unwrap().is_empty());
    }

    #[test]
    fn test_reset_filters_clears_everything() {
        let list = ElementList::new(
            "ListOrders",
            ApiSection::orders(),
            Parameters::new().with("OrderStatus.Status.1", "Shipped"),
            "Orders/Order",
        );
        let mut params = list.parameters();
        list.reset_filters(&mut params);
        assert!(params.is_empty());
    }
}
