//! Filtering and ordering over indexed templates.
//!
//! `query` is pure: no I/O, no state between calls. The text filter is a
//! conjunction of substring tests against the search text, not ranked search.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::template::Template;

/// Sort key for records without a category
const NO_CATEGORY: &str = "zzz";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortKey {
  #[default]
  NameAsc,
  NameDesc,
  Category,
}

impl SortKey {
  pub const ALL: [SortKey; 3] = [SortKey::NameAsc, SortKey::NameDesc, SortKey::Category];

  pub fn as_str(self) -> &'static str {
    match self {
      SortKey::NameAsc => "name-asc",
      SortKey::NameDesc => "name-desc",
      SortKey::Category => "category",
    }
  }
}

impl fmt::Display for SortKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SortKey {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    SortKey::ALL
      .into_iter()
      .find(|key| key.as_str() == s.trim())
      .ok_or_else(|| format!("unknown sort '{s}' (expected name-asc, name-desc or category)"))
  }
}

/// What the user is currently looking for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
  pub text: String,
  pub category: String,
  pub template_type: Option<i64>,
  pub sort: SortKey,
}

impl Criteria {
  /// Lowercase whitespace-delimited words of the text filter
  pub fn words(&self) -> Vec<String> {
    self.text.to_lowercase().split_whitespace().map(str::to_string).collect()
  }

  pub fn is_default(&self) -> bool {
    *self == Criteria::default()
  }

  pub fn matches(&self, template: &Template) -> bool {
    self.matches_words(template, &self.words())
  }

  fn matches_words(&self, template: &Template, words: &[String]) -> bool {
    let category_ok = self.category.is_empty() || template.categories.iter().any(|c| *c == self.category);
    let type_ok = self.template_type.is_none() || template.template_type == self.template_type;
    let text_ok = words.iter().all(|word| template.search_text.contains(word.as_str()));

    category_ok && type_ok && text_ok
  }
}

/// Records matching `criteria`, ordered by its sort key
pub fn query<'a>(records: &'a [Template], criteria: &Criteria) -> Vec<&'a Template> {
  let words = criteria.words();
  let mut matched: Vec<&Template> =
    records.iter().filter(|t| criteria.matches_words(t, &words)).collect();

  // `sort_by` is stable: ties keep document order
  match criteria.sort {
    SortKey::NameAsc => matched.sort_by(|a, b| locale_cmp(title_key(a), title_key(b))),
    SortKey::NameDesc => matched.sort_by(|a, b| locale_cmp(title_key(b), title_key(a))),
    SortKey::Category => {
      matched.sort_by(|a, b| locale_cmp(&category_key(a), &category_key(b)))
    }
  }

  matched
}

fn title_key(template: &Template) -> &str {
  template.title.as_deref().unwrap_or("")
}

fn category_key(template: &Template) -> String {
  template.primary_category().map(str::to_lowercase).unwrap_or_else(|| NO_CATEGORY.to_string())
}

/// Case-insensitive comparison first, exact comparison to break ties
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
  let folded = a.to_lowercase().cmp(&b.to_lowercase());
  folded.then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::indexer;
  use crate::template::Document;
  use serde_json::json;

  fn records(value: serde_json::Value) -> Vec<Template> {
    indexer::index(&Document::from_value(value)).unwrap().records
  }

  fn titles(found: &[&Template]) -> Vec<String> {
    found.iter().map(|t| t.display_name().to_string()).collect()
  }

  fn catalog() -> Vec<Template> {
    records(json!({"templates": [
      {"title": "Redis", "type": 1, "image": "redis:latest", "categories": ["Database"]},
      {"title": "nginx", "type": 1, "image": "nginx:latest", "categories": ["Web"], "description": "web server"},
      {"title": "Portainer Agent", "type": 2, "categories": ["tools"]},
      {"title": "Apache", "type": 1, "image": "httpd", "categories": ["Web", "Server"]},
      {"title": "Orphan", "type": 3}
    ]}))
  }

  #[test]
  fn test_sort_key_parsing() {
    assert_eq!("name-desc".parse::<SortKey>().unwrap(), SortKey::NameDesc);
    assert_eq!(" category ".parse::<SortKey>().unwrap(), SortKey::Category);
    assert!("popularity".parse::<SortKey>().is_err());
    assert_eq!(SortKey::default(), SortKey::NameAsc);
  }

  #[test]
  fn test_default_criteria_returns_everything_by_name() {
    let records = catalog();
    let found = query(&records, &Criteria::default());
    assert_eq!(titles(&found), vec!["Apache", "nginx", "Orphan", "Portainer Agent", "Redis"]);
  }

  #[test]
  fn test_name_desc_is_reverse_of_name_asc() {
    let records = catalog();
    let asc = query(&records, &Criteria::default());
    let desc = query(&records, &Criteria { sort: SortKey::NameDesc, ..Criteria::default() });
    let mut reversed = titles(&asc);
    reversed.reverse();
    assert_eq!(titles(&desc), reversed);
  }

  #[test]
  fn test_category_sort_puts_uncategorized_last() {
    let records = catalog();
    let found = query(&records, &Criteria { sort: SortKey::Category, ..Criteria::default() });
    assert_eq!(titles(&found), vec!["Redis", "Portainer Agent", "nginx", "Apache", "Orphan"]);
  }

  #[test]
  fn test_category_filter_is_exact() {
    let records = catalog();
    let web = query(&records, &Criteria { category: "Web".into(), ..Criteria::default() });
    assert_eq!(titles(&web), vec!["Apache", "nginx"]);

    let lower = query(&records, &Criteria { category: "web".into(), ..Criteria::default() });
    assert!(lower.is_empty());
  }

  #[test]
  fn test_type_filter_is_exact() {
    let records = catalog();
    let stacks = query(&records, &Criteria { template_type: Some(2), ..Criteria::default() });
    assert_eq!(titles(&stacks), vec!["Portainer Agent"]);

    let unknown = query(&records, &Criteria { template_type: Some(9), ..Criteria::default() });
    assert!(unknown.is_empty());
  }

  #[test]
  fn test_text_is_a_conjunction_in_any_order() {
    let records = catalog();
    let a = query(&records, &Criteria { text: "web SERVER".into(), ..Criteria::default() });
    let b = query(&records, &Criteria { text: "  server   web ".into(), ..Criteria::default() });
    assert_eq!(titles(&a), vec!["Apache", "nginx"]);
    assert_eq!(titles(&a), titles(&b));

    let none = query(&records, &Criteria { text: "web redis".into(), ..Criteria::default() });
    assert!(none.is_empty());
  }

  #[test]
  fn test_filters_combine() {
    let records = catalog();
    let criteria = Criteria {
      text: "latest".into(),
      category: "Web".into(),
      template_type: Some(1),
      sort: SortKey::NameDesc,
    };
    assert_eq!(titles(&query(&records, &criteria)), vec!["nginx"]);
  }

  #[test]
  fn test_query_is_idempotent() {
    let records = catalog();
    let criteria = Criteria { text: "e".into(), sort: SortKey::Category, ..Criteria::default() };
    assert_eq!(titles(&query(&records, &criteria)), titles(&query(&records, &criteria)));
  }

  #[test]
  fn test_ties_keep_document_order() {
    let records = records(json!({"templates": [
      {"title": "Same", "name": "first"},
      {"name": "untitled"},
      {"title": "Same", "name": "second"}
    ]}));
    let found = query(&records, &Criteria::default());
    let slugs: Vec<_> = found.iter().map(|t| t.slug()).collect();
    assert_eq!(slugs, vec!["untitled", "first", "second"]);
  }

  #[test]
  fn test_locale_cmp() {
    assert_eq!(locale_cmp("apple", "Banana"), Ordering::Less);
    assert_eq!(locale_cmp("b", "B"), Ordering::Greater);
    assert_eq!(locale_cmp("same", "same"), Ordering::Equal);
  }
}
