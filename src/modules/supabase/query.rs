/// PostgREST query string builder
///
/// Filters follow PostgREST's `column=operator.value` grammar. Keys and
/// values are percent-encoded when rendered.
#[derive(Debug, Clone, Default)]
pub struct Query {
    select: Option<String>,
    filters: Vec<(String, String)>,
    order: Vec<String>,
    limit: Option<usize>,
    on_conflict: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_string());
        self
    }

    pub fn eq(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, format!("eq.{}", value.to_string()))
    }

    pub fn neq(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, format!("neq.{}", value.to_string()))
    }

    pub fn not_null(self, column: &str) -> Self {
        self.filter(column, "not.is.null".to_string())
    }

    /// `column IN (values)`
    pub fn in_list<V: ToString>(self, column: &str, values: &[V]) -> Self {
        let joined = values
            .iter()
            .map(|v| quote_list_item(&v.to_string()))
            .collect::<Vec<_>>()
            .join(",");
        self.filter(column, format!("in.({})", joined))
    }

    /// Array overlap (`&&`) against a Postgres array column
    pub fn overlaps<V: ToString>(self, column: &str, values: &[V]) -> Self {
        let joined = values
            .iter()
            .map(|v| quote_list_item(&v.to_string()))
            .collect::<Vec<_>>()
            .join(",");
        self.filter(column, format!("ov.{{{}}}", joined))
    }

    /// Disjunction of raw PostgREST conditions, e.g. `title.ilike.*x*`
    pub fn or(self, conditions: &[String]) -> Self {
        self.filter("or", format!("({})", conditions.join(",")))
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order.push(format!("{}.{}", column, direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Conflict target for upserts
    pub fn on_conflict(mut self, columns: &str) -> Self {
        self.on_conflict = Some(columns.to_string());
        self
    }

    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    fn filter(mut self, key: &str, value: String) -> Self {
        self.filters.push((key.to_string(), value));
        self
    }

    /// Render as `a=b&c=d` without the leading `?`
    pub fn to_query_string(&self) -> String {
        let mut pairs: Vec<(String, String)> = Vec::new();

        if let Some(select) = &self.select {
            pairs.push(("select".to_string(), select.clone()));
        }
        pairs.extend(self.filters.iter().cloned());
        if !self.order.is_empty() {
            pairs.push(("order".to_string(), self.order.join(",")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(on_conflict) = &self.on_conflict {
            pairs.push(("on_conflict".to_string(), on_conflict.clone()));
        }

        pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Quote list items containing PostgREST reserved characters
fn quote_list_item(value: &str) -> String {
    if value.contains([',', '(', ')', '{', '}', '"', ' ']) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_query() {
        assert_eq!(Query::new().to_query_string(), "");
        assert!(!Query::new().has_filters());
    }

    #[test]
    fn test_select_filter_order_limit() {
        let query = Query::new()
            .select("id,title")
            .eq("owner_id", "u1")
            .order("created_at", false)
            .limit(10);

        assert_eq!(
            query.to_query_string(),
            "select=id%2Ctitle&owner_id=eq.u1&order=created_at.desc&limit=10"
        );
    }

    #[test]
    fn test_null_and_in_filters() {
        let query = Query::new()
            .not_null("expires_at")
            .in_list("role", &["owner", "admin"]);

        assert_eq!(
            query.to_query_string(),
            "expires_at=not.is.null&role=in.%28owner%2Cadmin%29"
        );
    }

    #[test]
    fn test_overlaps_quotes_reserved_items() {
        let query = Query::new().overlaps("tags", &["legal", "q1 report"]);
        assert_eq!(
            query.to_query_string(),
            "tags=ov.%7Blegal%2C%22q1%20report%22%7D"
        );
    }

    #[test]
    fn test_or_conditions_are_encoded() {
        let query = Query::new()
            .or(&[
                "title.ilike.*tax*".to_string(),
                "description.ilike.*tax*".to_string(),
            ]);

        assert_eq!(
            query.to_query_string(),
            "or=%28title.ilike.%2Atax%2A%2Cdescription.ilike.%2Atax%2A%29"
        );
    }

    #[test]
    fn test_values_are_percent_encoded() {
        let query = Query::new().eq("email", "a+b@x.io").neq("title", "a&b=c");
        assert_eq!(
            query.to_query_string(),
            "email=eq.a%2Bb%40x.io&title=neq.a%26b%3Dc"
        );
    }

    #[test]
    fn test_on_conflict() {
        let query = Query::new().on_conflict("user_id");
        assert_eq!(query.to_query_string(), "on_conflict=user_id");
    }
}
