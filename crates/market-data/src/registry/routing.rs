//! Routing table: data type -> provider preference and cache/retry policy.

use serde::{Deserialize, Serialize};

use crate::models::DataType;

/// Policy for one data type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRule {
    pub data_type: DataType,
    #[serde(default)]
    pub primary: Option<String>,
    /// Tried in order after the primary. Entries equal to the primary are
    /// skipped.
    #[serde(default)]
    pub fallbacks: Vec<String>,
    /// Lifetime recorded with router cache writes.
    pub cache_ttl_secs: u64,
    /// Extra attempts per provider after the first.
    #[serde(default)]
    pub max_retries: u32,
}

impl RoutingRule {
    pub fn new(data_type: DataType, primary: &str, fallbacks: &[&str], cache_ttl_secs: u64, max_retries: u32) -> Self {
        Self {
            data_type,
            primary: Some(primary.to_string()),
            fallbacks: fallbacks.iter().map(|s| s.to_string()).collect(),
            cache_ttl_secs,
            max_retries,
        }
    }

    /// A rule that names no providers.
    pub fn empty(data_type: DataType) -> Self {
        Self {
            data_type,
            primary: None,
            fallbacks: Vec::new(),
            cache_ttl_secs: 0,
            max_retries: 0,
        }
    }

    /// Provider names in preference order, primary first, without repeats.
    pub fn provider_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = Vec::with_capacity(1 + self.fallbacks.len());
        for name in self.primary.iter().chain(self.fallbacks.iter()) {
            if !order.contains(&name.as_str()) {
                order.push(name);
            }
        }
        order
    }

    pub fn attempts_per_provider(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Static lookup from data type to [`RoutingRule`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingTable {
    rules: Vec<RoutingRule>,
}

impl RoutingTable {
    pub fn new(rules: Vec<RoutingRule>) -> Self {
        Self { rules }
    }

    /// The rule for `data_type`, or an empty rule when none is configured.
    pub fn rule_for(&self, data_type: &DataType) -> RoutingRule {
        self.rules
            .iter()
            .find(|r| &r.data_type == data_type)
            .cloned()
            .unwrap_or_else(|| RoutingRule::empty(data_type.clone()))
    }

    /// Replace or add the rule for its data type.
    pub fn set_rule(&mut self, rule: RoutingRule) {
        match self.rules.iter_mut().find(|r| r.data_type == rule.data_type) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new(vec![
            RoutingRule::new(DataType::Vix, "fred", &["yahoo"], 300, 2),
            RoutingRule::new(DataType::Quote, "yahoo", &["yahoo"], 30, 2),
            RoutingRule::new(DataType::MarketData, "yahoo", &["yahoo"], 300, 1),
            RoutingRule::new(DataType::History, "yahoo", &["alphavantage"], 3600, 1),
            RoutingRule::new(DataType::News, "finnhub", &[], 300, 1),
            RoutingRule::new(DataType::EconomicEvents, "fred", &[], 3600, 1),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_vix_rule() {
        let rule = RoutingTable::default().rule_for(&DataType::Vix);
        assert_eq!(rule.primary.as_deref(), Some("fred"));
        assert_eq!(rule.fallbacks, vec!["yahoo".to_string()]);
        assert_eq!(rule.cache_ttl_secs, 300);
        assert_eq!(rule.attempts_per_provider(), 3);
    }

    #[test]
    fn test_unknown_data_type_gets_empty_rule() {
        let rule = RoutingTable::default().rule_for(&DataType::from("foo"));
        assert!(rule.primary.is_none());
        assert!(rule.provider_order().is_empty());
    }

    #[test]
    fn test_provider_order_skips_primary_in_fallbacks() {
        let rule = RoutingTable::default().rule_for(&DataType::Quote);
        assert_eq!(rule.provider_order(), vec!["yahoo"]);

        let rule = RoutingRule::new(DataType::Vix, "a", &["b", "a", "c", "b"], 60, 0);
        assert_eq!(rule.provider_order(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_set_rule_replaces() {
        let mut table = RoutingTable::default();
        table.set_rule(RoutingRule::new(DataType::Vix, "polygon", &[], 10, 0));
        let rule = table.rule_for(&DataType::Vix);
        assert_eq!(rule.primary.as_deref(), Some("polygon"));
        assert_eq!(table.rules().len(), 6);
    }

    #[test]
    fn test_deserialize_rules() {
        let json = r#"[
            {"dataType": "VIX", "primary": "polygon", "fallbacks": ["fred"], "cacheTtlSecs": 120, "maxRetries": 1},
            {"dataType": "quote", "cacheTtlSecs": 5}
        ]"#;
        let table: RoutingTable = serde_json::from_str(json).unwrap();

        let vix = table.rule_for(&DataType::Vix);
        assert_eq!(vix.provider_order(), vec!["polygon", "fred"]);

        let quote = table.rule_for(&DataType::Quote);
        assert!(quote.primary.is_none());
        assert_eq!(quote.attempts_per_provider(), 1);
    }
}
