//! Typed aggregation pipelines compiled to a single SQL statement.
//!
//! A `View` is an ordered list of stages over a base collection: matches,
//! one-to-one joins, derived values (counts, sums, existence, first-of),
//! a required projection and sort keys. Derived values are correlated
//! subqueries, so every count is read from the relation rows themselves.

use std::collections::HashMap;

use rusqlite::types::Value;

use crate::error::{StoreError, StoreResult};

/// Alias of the base collection in compiled SQL.
pub const BASE: &str = "b";

/// Columns of `users` that a view may project. Credentials are never listed.
pub const PUBLIC_USER_COLUMNS: &[&str] = &[
    "id",
    "username",
    "full_name",
    "avatar_url",
    "cover_image_url",
    "created_at",
    "updated_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    Videos,
    VideoViews,
    Tweets,
    Comments,
    Playlists,
    PlaylistVideos,
    Likes,
    Subscriptions,
}

impl Collection {
    pub fn table(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Videos => "videos",
            Self::VideoViews => "video_views",
            Self::Tweets => "tweets",
            Self::Comments => "comments",
            Self::Playlists => "playlists",
            Self::PlaylistVideos => "playlist_videos",
            Self::Likes => "likes",
            Self::Subscriptions => "subscriptions",
        }
    }
}

/// A column of the base collection or of a joined one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Col {
    pub alias: &'static str,
    pub column: &'static str,
}

impl Col {
    pub const fn base(column: &'static str) -> Self {
        Self { alias: BASE, column }
    }

    pub const fn of(alias: &'static str, column: &'static str) -> Self {
        Self { alias, column }
    }
}

/// Rows of another collection related to the current row, either directly
/// (`related.foreign = anchor`) or through one intermediate collection
/// (`hop.hop_anchor = anchor AND related.foreign = hop.hop_out`).
#[derive(Debug, Clone)]
pub struct Related {
    collection: Collection,
    foreign: &'static str,
    anchor: Col,
    via: Option<Hop>,
    filters: Vec<(&'static str, Value)>,
}

#[derive(Debug, Clone)]
struct Hop {
    collection: Collection,
    anchor_column: &'static str,
    out_column: &'static str,
}

impl Related {
    pub fn direct(collection: Collection, foreign: &'static str, anchor: Col) -> Self {
        Self {
            collection,
            foreign,
            anchor,
            via: None,
            filters: Vec::new(),
        }
    }

    /// `collection` rows whose `foreign` column points at a `hop` row, where
    /// the hop row's `hop_anchor` column equals `anchor`.
    pub fn via(
        collection: Collection,
        foreign: &'static str,
        hop: Collection,
        hop_anchor: &'static str,
        hop_out: &'static str,
        anchor: Col,
    ) -> Self {
        Self {
            collection,
            foreign,
            anchor,
            via: Some(Hop {
                collection: hop,
                anchor_column: hop_anchor,
                out_column: hop_out,
            }),
            filters: Vec::new(),
        }
    }

    /// Restricts related rows to `column = value`.
    pub fn filter(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push((column, value.into()));
        self
    }
}

/// A column inside a derive subquery: on the related row or on the hop row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelCol {
    Row(&'static str),
    Hop(&'static str),
}

#[derive(Debug, Clone)]
pub enum Predicate {
    Eq(Col, Value),
    /// Case-insensitive substring match.
    Contains(Col, String),
    /// Inclusive on both ends; an absent bound is open.
    Range {
        col: Col,
        min: Option<Value>,
        max: Option<Value>,
    },
    Any(Vec<Predicate>),
    Exists(Related),
}

impl Predicate {
    pub fn eq(col: Col, value: impl Into<Value>) -> Self {
        Self::Eq(col, value.into())
    }

    pub fn contains(col: Col, needle: impl Into<String>) -> Self {
        Self::Contains(col, needle.into())
    }

    pub fn range(col: Col, min: Option<Value>, max: Option<Value>) -> Self {
        Self::Range { col, min, max }
    }
}

#[derive(Debug, Clone)]
pub enum Derive {
    Count(Related),
    /// Sum of a numeric column of the related rows; 0 when there are none.
    Sum(Related, &'static str),
    Exists(Related),
    /// One column of the first related row in the given order; NULL if none.
    First {
        from: Related,
        column: RelCol,
        order: RelCol,
        direction: Direction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Join {
    pub alias: &'static str,
    pub collection: Collection,
    /// Foreign key matched against the joined collection's `id`.
    pub on: Col,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Col(Col),
    Derived(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Output {
    pub name: &'static str,
    pub source: Source,
}

impl Output {
    pub const fn col(name: &'static str, col: Col) -> Self {
        Self {
            name,
            source: Source::Col(col),
        }
    }

    /// Outputs a derived value under its own name.
    pub const fn derived(name: &'static str) -> Self {
        Self {
            name,
            source: Source::Derived(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub source: Source,
    pub direction: Direction,
}

#[derive(Debug, Clone)]
pub enum Stage {
    Match(Predicate),
    Join(Join),
    Derive { name: &'static str, derive: Derive },
    Project(Vec<Output>),
    Sort(SortKey),
}

#[derive(Debug, Clone)]
pub struct View {
    name: &'static str,
    base: Collection,
    stages: Vec<Stage>,
}

/// SQL text plus its positional parameters.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

impl View {
    pub fn new(name: &'static str, base: Collection) -> Self {
        Self {
            name,
            base,
            stages: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn matching(mut self, predicate: Predicate) -> Self {
        self.stages.push(Stage::Match(predicate));
        self
    }

    pub fn join(mut self, alias: &'static str, collection: Collection, on: Col) -> Self {
        self.stages.push(Stage::Join(Join {
            alias,
            collection,
            on,
        }));
        self
    }

    pub fn derive(mut self, name: &'static str, derive: Derive) -> Self {
        self.stages.push(Stage::Derive { name, derive });
        self
    }

    /// Adds outputs. Several project stages accumulate.
    pub fn project(mut self, outputs: impl IntoIterator<Item = Output>) -> Self {
        self.stages.push(Stage::Project(outputs.into_iter().collect()));
        self
    }

    pub fn sort(mut self, source: Source, direction: Direction) -> Self {
        self.stages.push(Stage::Sort(SortKey { source, direction }));
        self
    }

    /// Compiles the full row query. With `window`, appends LIMIT/OFFSET.
    pub fn compile(&self, window: Option<(u32, u64)>) -> StoreResult<CompiledQuery> {
        let mut c = Compiler::new(self);
        let plan = c.plan()?;

        let mut select = Vec::with_capacity(plan.outputs.len());
        for output in &plan.outputs {
            let expr = c.source(output.source)?;
            select.push(format!("{expr} AS {}", output.name));
        }

        let mut order = Vec::with_capacity(plan.sorts.len() + 1);
        for key in &plan.sorts {
            let expr = c.source(key.source)?;
            order.push(format!("{expr} {}", key.direction.sql()));
        }
        order.push(format!("{BASE}.id ASC"));

        let mut sql = format!(
            "SELECT {} FROM {} {BASE}{}{} ORDER BY {}",
            select.join(", "),
            self.base.table(),
            plan.joins,
            plan.filter,
            order.join(", ")
        );
        if let Some((limit, offset)) = window {
            let limit = c.bind(Value::Integer(limit as i64));
            let offset = c.bind(Value::Integer(offset as i64));
            sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
        }

        Ok(CompiledQuery {
            sql,
            params: c.params,
        })
    }

    /// Compiles a query counting the rows the view would return.
    pub fn compile_count(&self) -> StoreResult<CompiledQuery> {
        let mut c = Compiler::new(self);
        let plan = c.plan()?;
        Ok(CompiledQuery {
            sql: format!(
                "SELECT COUNT(*) FROM {} {BASE}{}{}",
                self.base.table(),
                plan.joins,
                plan.filter
            ),
            params: c.params,
        })
    }
}

struct Plan {
    joins: String,
    filter: String,
    outputs: Vec<Output>,
    sorts: Vec<SortKey>,
}

struct Compiler<'v> {
    view: &'v View,
    aliases: HashMap<&'static str, Collection>,
    derived: HashMap<&'static str, &'v Derive>,
    params: Vec<Value>,
    subqueries: usize,
}

impl<'v> Compiler<'v> {
    fn new(view: &'v View) -> Self {
        Self {
            view,
            aliases: HashMap::from([(BASE, view.base)]),
            derived: HashMap::new(),
            params: Vec::new(),
            subqueries: 0,
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> StoreError {
        StoreError::InvalidView {
            view: self.view.name,
            reason: reason.into(),
        }
    }

    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("?{}", self.params.len())
    }

    /// Resolves aliases and derived names, renders joins and the WHERE
    /// clause, and collects outputs and sort keys for the caller to render.
    /// Placeholders are numbered, so binding order need not follow SQL order.
    fn plan(&mut self) -> StoreResult<Plan> {
        let mut joins = String::new();
        let mut conditions = Vec::new();
        let mut outputs = Vec::new();
        let mut sorts = Vec::new();
        let view = self.view;

        for stage in &view.stages {
            match stage {
                Stage::Join(join) => {
                    if self.aliases.contains_key(join.alias) {
                        return Err(self.invalid(format!("alias `{}` declared twice", join.alias)));
                    }
                    let on = self.col(join.on)?;
                    joins.push_str(&format!(
                        " JOIN {} {} ON {}.id = {on}",
                        join.collection.table(),
                        join.alias,
                        join.alias
                    ));
                    self.aliases.insert(join.alias, join.collection);
                }
                Stage::Derive { name, derive } => {
                    if self.derived.insert(*name, derive).is_some() {
                        return Err(self.invalid(format!("derived value `{name}` declared twice")));
                    }
                }
                Stage::Project(list) => outputs.extend(list.iter().copied()),
                Stage::Sort(key) => sorts.push(*key),
                Stage::Match(_) => {}
            }
        }

        // A match may name an alias joined by a later stage.
        for stage in &view.stages {
            if let Stage::Match(predicate) = stage {
                conditions.push(self.predicate(predicate)?);
            }
        }

        if outputs.is_empty() {
            return Err(self.invalid("no projection"));
        }
        let mut seen = Vec::with_capacity(outputs.len());
        for output in &outputs {
            if seen.contains(&output.name) {
                return Err(self.invalid(format!("output `{}` projected twice", output.name)));
            }
            seen.push(output.name);
            self.check_public(output.source)?;
        }

        let filter = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        Ok(Plan {
            joins,
            filter,
            outputs,
            sorts,
        })
    }

    fn col(&self, col: Col) -> StoreResult<String> {
        if !self.aliases.contains_key(col.alias) {
            return Err(self.invalid(format!("unknown alias `{}`", col.alias)));
        }
        Ok(format!("{}.{}", col.alias, col.column))
    }

    fn check_public(&self, source: Source) -> StoreResult<()> {
        let (collection, column) = match source {
            Source::Col(col) => match self.aliases.get(col.alias) {
                Some(collection) => (*collection, col.column),
                None => return Err(self.invalid(format!("unknown alias `{}`", col.alias))),
            },
            Source::Derived(name) => match self.derived.get(name) {
                Some(Derive::First {
                    from,
                    column: RelCol::Row(column),
                    ..
                }) => (from.collection, *column),
                Some(Derive::First {
                    from,
                    column: RelCol::Hop(column),
                    ..
                }) => match &from.via {
                    Some(hop) => (hop.collection, *column),
                    None => return Err(self.invalid(format!("`{name}` reads a hop column without a hop"))),
                },
                _ => return Ok(()),
            },
        };

        if collection == Collection::Users && !PUBLIC_USER_COLUMNS.contains(&column) {
            return Err(self.invalid(format!("users.{column} is not a public column")));
        }
        Ok(())
    }

    fn source(&mut self, source: Source) -> StoreResult<String> {
        match source {
            Source::Col(col) => self.col(col),
            Source::Derived(name) => {
                let derive = *self
                    .derived
                    .get(name)
                    .ok_or_else(|| self.invalid(format!("unknown derived value `{name}`")))?;
                self.derive(derive)
            }
        }
    }

    fn predicate(&mut self, predicate: &Predicate) -> StoreResult<String> {
        match predicate {
            Predicate::Eq(col, value) => {
                let col = self.col(*col)?;
                let p = self.bind(value.clone());
                Ok(format!("{col} = {p}"))
            }
            Predicate::Contains(col, needle) => {
                let col = self.col(*col)?;
                let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
                let p = self.bind(Value::Text(pattern));
                Ok(format!("{FOLD_CASE}({col}) LIKE {p} ESCAPE '\\'"))
            }
            Predicate::Range { col, min, max } => {
                let col = self.col(*col)?;
                let mut parts = Vec::new();
                if let Some(min) = min {
                    let p = self.bind(min.clone());
                    parts.push(format!("{col} >= {p}"));
                }
                if let Some(max) = max {
                    let p = self.bind(max.clone());
                    parts.push(format!("{col} <= {p}"));
                }
                if parts.is_empty() {
                    Ok("1".to_string())
                } else {
                    Ok(format!("({})", parts.join(" AND ")))
                }
            }
            Predicate::Any(options) => {
                if options.is_empty() {
                    return Ok("0".to_string());
                }
                let parts = options
                    .iter()
                    .map(|p| self.predicate(p))
                    .collect::<StoreResult<Vec<_>>>()?;
                Ok(format!("({})", parts.join(" OR ")))
            }
            Predicate::Exists(related) => {
                let (from, filter) = self.related(related)?;
                Ok(format!("EXISTS(SELECT 1 FROM {from} WHERE {filter})"))
            }
        }
    }

    fn derive(&mut self, derive: &Derive) -> StoreResult<String> {
        match derive {
            Derive::Count(related) => {
                let (from, filter) = self.related(related)?;
                Ok(format!("(SELECT COUNT(*) FROM {from} WHERE {filter})"))
            }
            Derive::Sum(related, column) => {
                let alias = self.next_alias("r");
                let (from, filter) = self.related_as(related, &alias)?;
                Ok(format!(
                    "(SELECT COALESCE(SUM({alias}.{column}), 0) FROM {from} WHERE {filter})"
                ))
            }
            Derive::Exists(related) => {
                let (from, filter) = self.related(related)?;
                Ok(format!("EXISTS(SELECT 1 FROM {from} WHERE {filter})"))
            }
            Derive::First {
                from: related,
                column,
                order,
                direction,
            } => {
                let alias = self.next_alias("r");
                let (from, filter) = self.related_as(related, &alias)?;
                let hop = hop_alias(&alias);
                let pick = |c: &RelCol| match c {
                    RelCol::Row(name) => format!("{alias}.{name}"),
                    RelCol::Hop(name) => format!("{hop}.{name}"),
                };
                if related.via.is_none()
                    && (matches!(column, RelCol::Hop(_)) || matches!(order, RelCol::Hop(_)))
                {
                    return Err(self.invalid("first-of reads a hop column without a hop"));
                }
                Ok(format!(
                    "(SELECT {} FROM {from} WHERE {filter} ORDER BY {} {} LIMIT 1)",
                    pick(column),
                    pick(order),
                    direction.sql()
                ))
            }
        }
    }

    fn next_alias(&mut self, prefix: &str) -> String {
        self.subqueries += 1;
        format!("{prefix}{}", self.subqueries)
    }

    fn related(&mut self, related: &Related) -> StoreResult<(String, String)> {
        let alias = self.next_alias("r");
        self.related_as(related, &alias)
    }

    /// FROM clause and WHERE condition selecting the related rows of the
    /// current outer row, with the related collection aliased as `alias`.
    fn related_as(&mut self, related: &Related, alias: &str) -> StoreResult<(String, String)> {
        let anchor = self.col(related.anchor)?;
        let table = related.collection.table();

        let (from, mut conditions) = match &related.via {
            None => (
                format!("{table} {alias}"),
                vec![format!("{alias}.{} = {anchor}", related.foreign)],
            ),
            Some(hop) => {
                let h = hop_alias(alias);
                (
                    format!(
                        "{table} {alias} JOIN {} {h} ON {alias}.{} = {h}.{}",
                        hop.collection.table(),
                        related.foreign,
                        hop.out_column
                    ),
                    vec![format!("{h}.{} = {anchor}", hop.anchor_column)],
                )
            }
        };

        for (column, value) in &related.filters {
            let p = self.bind(value.clone());
            conditions.push(format!("{alias}.{column} = {p}"));
        }

        Ok((from, conditions.join(" AND ")))
    }
}

fn hop_alias(related_alias: &str) -> String {
    format!("{related_alias}h")
}

/// SQL scalar registered on every connection. It folds case with
/// `str::to_lowercase`, the same rules applied to search needles.
pub(crate) const FOLD_CASE: &str = "fold_case";

fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner_card() -> View {
        View::new("owner_card", Collection::Videos)
            .join("owner", Collection::Users, Col::base("owner_id"))
            .derive(
                "view_count",
                Derive::Count(Related::direct(Collection::VideoViews, "video_id", Col::base("id"))),
            )
            .project([
                Output::col("id", Col::base("id")),
                Output::col("owner_username", Col::of("owner", "username")),
                Output::derived("view_count"),
            ])
    }

    #[test]
    fn projection_is_required() {
        let view = View::new("bare", Collection::Videos);
        assert!(matches!(
            view.compile(None),
            Err(StoreError::InvalidView { view: "bare", .. })
        ));
    }

    #[test]
    fn credentials_cannot_be_projected() {
        let view = View::new("leaky", Collection::Videos)
            .join("owner", Collection::Users, Col::base("owner_id"))
            .project([Output::col("hash", Col::of("owner", "password_hash"))]);
        assert!(matches!(view.compile(None), Err(StoreError::InvalidView { .. })));

        let view = View::new("leaky_base", Collection::Users)
            .project([Output::col("token", Col::base("refresh_token_hash"))]);
        assert!(matches!(view.compile(None), Err(StoreError::InvalidView { .. })));

        let view = View::new("leaky_first", Collection::Videos).derive(
            "owner_hash",
            Derive::First {
                from: Related::direct(Collection::Users, "id", Col::base("owner_id")),
                column: RelCol::Row("password_hash"),
                order: RelCol::Row("id"),
                direction: Direction::Asc,
            },
        );
        let view = view.project([Output::derived("owner_hash")]);
        assert!(matches!(view.compile(None), Err(StoreError::InvalidView { .. })));
    }

    #[test]
    fn id_is_always_the_last_sort_key() {
        let query = owner_card()
            .sort(Source::Derived("view_count"), Direction::Desc)
            .compile(None)
            .unwrap();
        assert!(query.sql.ends_with("DESC, b.id ASC"), "{}", query.sql);

        let query = owner_card().compile(None).unwrap();
        assert!(query.sql.ends_with("ORDER BY b.id ASC"), "{}", query.sql);
    }

    #[test]
    fn parameters_bind_by_number() {
        let query = owner_card()
            .matching(Predicate::eq(Col::base("is_published"), true))
            .matching(Predicate::contains(Col::base("title"), "50%_off"))
            .compile(Some((10, 20)))
            .unwrap();

        assert_eq!(query.params.len(), 4);
        assert_eq!(query.params[0], Value::Integer(1));
        assert_eq!(query.params[1], Value::Text("%50\\%\\_off%".into()));
        assert!(query.sql.contains("fold_case(b.title) LIKE ?2"), "{}", query.sql);
        assert!(query.sql.contains("LIMIT ?3 OFFSET ?4"), "{}", query.sql);
        assert_eq!(query.params[2], Value::Integer(10));
        assert_eq!(query.params[3], Value::Integer(20));
    }

    #[test]
    fn unknown_aliases_and_derived_names_fail() {
        let view = View::new("typo", Collection::Videos)
            .project([Output::col("name", Col::of("ownr", "username"))]);
        assert!(matches!(view.compile(None), Err(StoreError::InvalidView { .. })));

        let view = View::new("undeclared", Collection::Videos).project([Output::derived("like_count")]);
        assert!(matches!(view.compile(None), Err(StoreError::InvalidView { .. })));
    }

    #[test]
    fn count_query_shares_the_filter() {
        let view = owner_card().matching(Predicate::range(
            Col::base("duration_seconds"),
            Some(Value::Real(10.0)),
            None,
        ));
        let count = view.compile_count().unwrap();
        assert!(count.sql.starts_with("SELECT COUNT(*) FROM videos b JOIN users owner"));
        assert!(count.sql.contains("b.duration_seconds >= ?1"), "{}", count.sql);
        assert_eq!(count.params, vec![Value::Real(10.0)]);
    }
}
