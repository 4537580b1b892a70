//! Purpose: Typed search parameters and their `params` wire encoding.
//! Exports: `SearchQuery`, `BrowseQuery`, parameter value types, `parse_query_string`.
//! Role: Pure serializer shared by search and browse requests.
//! Invariants: Fields are emitted in declaration order; absent fields are skipped.
//! Invariants: Values are form-urlencoded; the reverse direction is unsupported.
use crate::core::error::{Error, ErrorKind};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::form_urlencoded;

/// String form of a parameter value before URL encoding.
pub trait ToParam {
    fn to_param(&self) -> String;
}

impl ToParam for bool {
    fn to_param(&self) -> String {
        self.to_string()
    }
}

impl ToParam for u32 {
    fn to_param(&self) -> String {
        self.to_string()
    }
}

impl ToParam for String {
    fn to_param(&self) -> String {
        self.clone()
    }
}

impl ToParam for Vec<String> {
    fn to_param(&self) -> String {
        string_array(self).to_string()
    }
}

impl ToParam for Vec<FilterGroup> {
    fn to_param(&self) -> String {
        Value::Array(self.iter().map(FilterGroup::to_json).collect()).to_string()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueryType {
    PrefixAll,
    PrefixLast,
    PrefixNone,
}

impl ToParam for QueryType {
    fn to_param(&self) -> String {
        match self {
            QueryType::PrefixAll => "prefixAll",
            QueryType::PrefixLast => "prefixLast",
            QueryType::PrefixNone => "prefixNone",
        }
        .to_string()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TypoTolerance {
    Enabled,
    Disabled,
    Min,
    Strict,
}

impl ToParam for TypoTolerance {
    fn to_param(&self) -> String {
        match self {
            TypoTolerance::Enabled => "true",
            TypoTolerance::Disabled => "false",
            TypoTolerance::Min => "min",
            TypoTolerance::Strict => "strict",
        }
        .to_string()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Distinct {
    Enabled(bool),
    Count(u32),
}

impl ToParam for Distinct {
    fn to_param(&self) -> String {
        match self {
            Distinct::Enabled(enabled) => enabled.to_string(),
            Distinct::Count(count) => count.to_string(),
        }
    }
}

/// Used by `ignorePlurals` and `removeStopWords`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LanguageToggle {
    Enabled(bool),
    Languages(Vec<String>),
}

impl ToParam for LanguageToggle {
    fn to_param(&self) -> String {
        match self {
            LanguageToggle::Enabled(enabled) => enabled.to_string(),
            LanguageToggle::Languages(languages) => languages.to_param(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AroundRadius {
    Meters(u32),
    All,
}

impl ToParam for AroundRadius {
    fn to_param(&self) -> String {
        match self {
            AroundRadius::Meters(meters) => meters.to_string(),
            AroundRadius::All => "all".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl ToParam for LatLng {
    fn to_param(&self) -> String {
        format!("{},{}", self.lat, self.lng)
    }
}

/// One conjunct of a facet/numeric/tag filter list; `Any` is an OR group.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FilterGroup {
    Single(String),
    Any(Vec<String>),
}

impl FilterGroup {
    pub fn single(filter: impl Into<String>) -> Self {
        Self::Single(filter.into())
    }

    pub fn any<I, S>(filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Any(filters.into_iter().map(Into::into).collect())
    }

    fn to_json(&self) -> Value {
        match self {
            FilterGroup::Single(filter) => Value::String(filter.clone()),
            FilterGroup::Any(filters) => string_array(filters),
        }
    }
}

fn string_array(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}

macro_rules! search_params {
    ($($(#[$meta:meta])* $field:ident: $ty:ty => $wire:literal,)*) => {
        /// Search parameters. Every field is optional; only set fields reach the wire.
        #[derive(Clone, Debug, Default, PartialEq)]
        pub struct SearchQuery {
            $($(#[$meta])* pub $field: Option<$ty>,)*
        }

        impl SearchQuery {
            /// Wire names in declaration order.
            pub const FIELD_NAMES: &'static [&'static str] = &[$($wire),*];

            /// Set fields as `(wire name, unencoded value)`, in declaration order.
            pub fn param_pairs(&self) -> Vec<(&'static str, String)> {
                let mut pairs = Vec::new();
                $(
                    if let Some(value) = &self.$field {
                        pairs.push(($wire, value.to_param()));
                    }
                )*
                pairs
            }
        }
    };
}

// Declared in lexicographic wire-name order.
search_params! {
    advanced_syntax: bool => "advancedSyntax",
    allow_typos_on_numeric_tokens: bool => "allowTyposOnNumericTokens",
    analytics: bool => "analytics",
    analytics_tags: Vec<String> => "analyticsTags",
    around_lat_lng: LatLng => "aroundLatLng",
    around_lat_lng_via_ip: bool => "aroundLatLngViaIP",
    around_radius: AroundRadius => "aroundRadius",
    attributes_to_highlight: Vec<String> => "attributesToHighlight",
    attributes_to_retrieve: Vec<String> => "attributesToRetrieve",
    attributes_to_snippet: Vec<String> => "attributesToSnippet",
    click_analytics: bool => "clickAnalytics",
    distinct: Distinct => "distinct",
    enable_rules: bool => "enableRules",
    facet_filters: Vec<FilterGroup> => "facetFilters",
    facets: Vec<String> => "facets",
    /// Filter expression, e.g. `category:shoes AND price < 100`.
    filters: String => "filters",
    get_ranking_info: bool => "getRankingInfo",
    hits_per_page: u32 => "hitsPerPage",
    ignore_plurals: LanguageToggle => "ignorePlurals",
    length: u32 => "length",
    max_values_per_facet: u32 => "maxValuesPerFacet",
    numeric_filters: Vec<FilterGroup> => "numericFilters",
    offset: u32 => "offset",
    optional_words: Vec<String> => "optionalWords",
    page: u32 => "page",
    /// Full-text query.
    query: String => "query",
    query_type: QueryType => "queryType",
    remove_stop_words: LanguageToggle => "removeStopWords",
    restrict_searchable_attributes: Vec<String> => "restrictSearchableAttributes",
    rule_contexts: Vec<String> => "ruleContexts",
    tag_filters: Vec<FilterGroup> => "tagFilters",
    typo_tolerance: TypoTolerance => "typoTolerance",
    user_token: String => "userToken",
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    /// `name=value&name2=value2`, values form-urlencoded. Empty when nothing is set.
    pub fn to_query_string(&self) -> String {
        self.param_pairs()
            .into_iter()
            .map(|(name, value)| format!("{name}={}", encode_value(&value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn encode_value(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Serializes as the `{"params": "<query string>"}` envelope.
impl Serialize for SearchQuery {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("params", &self.to_query_string())?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for SearchQuery {
    fn deserialize<D>(_deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Err(de::Error::custom(UNSUPPORTED_REVERSE))
    }
}

const UNSUPPORTED_REVERSE: &str = "search queries are write-only and cannot be decoded";

/// Always fails: queries are only ever sent, never read back.
pub fn parse_query_string(_params: &str) -> Result<SearchQuery, Error> {
    Err(Error::new(ErrorKind::Unsupported)
        .with_message(UNSUPPORTED_REVERSE)
        .with_hint("build a SearchQuery value instead of parsing its wire form"))
}

/// Search parameters plus the opaque continuation cursor of a browse session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BrowseQuery {
    pub params: SearchQuery,
    /// Absent at session start and again once the collection is exhausted.
    pub cursor: Option<String>,
}

impl BrowseQuery {
    pub fn new(params: SearchQuery) -> Self {
        Self {
            params,
            cursor: None,
        }
    }

    /// Resume from a cursor returned by an earlier page.
    pub fn from_cursor(cursor: impl Into<String>) -> Self {
        Self {
            params: SearchQuery::default(),
            cursor: Some(cursor.into()),
        }
    }
}

impl From<SearchQuery> for BrowseQuery {
    fn from(params: SearchQuery) -> Self {
        Self::new(params)
    }
}

impl Serialize for BrowseQuery {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = if self.cursor.is_some() { 2 } else { 1 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("params", &self.params.to_query_string())?;
        if let Some(cursor) = &self.cursor {
            map.serialize_entry("cursor", cursor)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AroundRadius, BrowseQuery, Distinct, FilterGroup, LanguageToggle, LatLng, QueryType,
        SearchQuery, TypoTolerance, parse_query_string,
    };
    use crate::core::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn query_and_hits_per_page_serialize_in_declaration_order() {
        let query = SearchQuery {
            query: Some("shoe".to_string()),
            hits_per_page: Some(20),
            ..SearchQuery::default()
        };
        assert_eq!(query.to_query_string(), "hitsPerPage=20&query=shoe");
    }

    #[test]
    fn empty_query_serializes_to_empty_string() {
        assert_eq!(SearchQuery::default().to_query_string(), "");
        let body = serde_json::to_value(SearchQuery::default()).expect("json");
        assert_eq!(body, json!({ "params": "" }));
    }

    #[test]
    fn field_names_are_declared_in_sorted_order() {
        let mut sorted = SearchQuery::FIELD_NAMES.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, SearchQuery::FIELD_NAMES);
    }

    #[test]
    fn reserved_and_non_ascii_characters_are_percent_encoded() {
        let query = SearchQuery::new("a&b=c d/é");
        assert_eq!(query.to_query_string(), "query=a%26b%3Dc+d%2F%C3%A9");
    }

    #[test]
    fn nested_values_use_their_own_string_form() {
        let query = SearchQuery {
            around_lat_lng: Some(LatLng {
                lat: 40.71,
                lng: -74.01,
            }),
            around_radius: Some(AroundRadius::All),
            attributes_to_retrieve: Some(vec!["title".to_string(), "price".to_string()]),
            distinct: Some(Distinct::Count(2)),
            facet_filters: Some(vec![
                FilterGroup::single("brand:acme"),
                FilterGroup::any(["color:red", "color:blue"]),
            ]),
            ignore_plurals: Some(LanguageToggle::Enabled(false)),
            query_type: Some(QueryType::PrefixNone),
            typo_tolerance: Some(TypoTolerance::Strict),
            ..SearchQuery::default()
        };
        let pairs = query.param_pairs();
        assert_eq!(
            pairs,
            vec![
                ("aroundLatLng", "40.71,-74.01".to_string()),
                ("aroundRadius", "all".to_string()),
                ("attributesToRetrieve", r#"["title","price"]"#.to_string()),
                ("distinct", "2".to_string()),
                (
                    "facetFilters",
                    r#"["brand:acme",["color:red","color:blue"]]"#.to_string()
                ),
                ("ignorePlurals", "false".to_string()),
                ("queryType", "prefixNone".to_string()),
                ("typoTolerance", "strict".to_string()),
            ]
        );
    }

    #[test]
    fn search_query_serializes_as_params_envelope() {
        let query = SearchQuery {
            filters: Some("price < 10".to_string()),
            ..SearchQuery::default()
        };
        let body = serde_json::to_value(&query).expect("json");
        assert_eq!(body, json!({ "params": "filters=price+%3C+10" }));
    }

    #[test]
    fn browse_query_omits_absent_cursor() {
        let mut browse = BrowseQuery::new(SearchQuery::new("shoe"));
        assert_eq!(
            serde_json::to_value(&browse).expect("json"),
            json!({ "params": "query=shoe" })
        );
        browse.cursor = Some("c1".to_string());
        assert_eq!(
            serde_json::to_value(&browse).expect("json"),
            json!({ "params": "query=shoe", "cursor": "c1" })
        );
    }

    #[test]
    fn reverse_direction_is_unsupported() {
        let err = parse_query_string("query=shoe").expect_err("unsupported");
        assert_eq!(err.kind(), ErrorKind::Unsupported);

        let decoded = serde_json::from_str::<SearchQuery>(r#"{"params":"query=shoe"}"#);
        assert!(decoded.is_err());
    }
}
