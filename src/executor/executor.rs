//! Query Executor for RowDB
//!
//! This module runs requests against the tables on disk and returns
//! results. Row-returning requests produce a lazy [`ResultRows`].

use std::fmt;

use tracing::{debug, info};

use super::join::JoinedTable;
use super::planner::Planner;
use super::query::{fold, Condition, Literal, Operator, Query, QueryField, TableId};
use super::result_set::{ResultSet, ResultSets};
use crate::catalog::{TableInfo, TableSchema};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::sql::ast::{CreateIndex, CreateTable, Insert, Request, Select};
use crate::sql::Conjunction;
use crate::storage::{
    index, materialize, DiskManager, MaterializedTable, ObjectKind, PersistentTable, RowSource,
    Table,
};

/// One output row: display strings in projection order
pub type Row = Vec<String>;

/// Lazily produced result rows
pub struct ResultRows {
    columns: Vec<String>,
    rows: Box<dyn Iterator<Item = Result<Row>>>,
}

impl ResultRows {
    fn new(columns: Vec<String>, rows: impl Iterator<Item = Result<Row>> + 'static) -> Self {
        Self {
            columns,
            rows: Box::new(rows),
        }
    }

    /// Output column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Drain every row, stopping at the first error
    pub fn collect_rows(self) -> Result<Vec<Row>> {
        self.collect()
    }
}

impl Iterator for ResultRows {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

impl fmt::Debug for ResultRows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultRows")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// Query result
#[derive(Debug)]
pub enum QueryResult {
    /// Rows of a SELECT
    Rows(ResultRows),
    /// Description of a table or index
    Table(TableInfo),
    /// Statement completed
    Done(String),
}

/// Execution Engine
#[derive(Debug)]
pub struct ExecutionEngine {
    config: EngineConfig,
    disk: DiskManager,
}

impl ExecutionEngine {
    /// Create a new execution engine
    pub fn new(config: EngineConfig) -> Result<Self> {
        if !config.data_dir.exists() {
            std::fs::create_dir_all(&config.data_dir)?;
        }
        let disk = DiskManager::new(&config);
        info!(data_dir = %disk.data_dir().display(), "engine opened");
        Ok(Self { config, disk })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute a request
    pub fn execute(&mut self, request: Request) -> Result<QueryResult> {
        match request {
            Request::CreateTable(create) => {
                self.create_table(&create)?;
                Ok(QueryResult::Done(format!("Table {} created", create.name)))
            }
            Request::Insert(insert) => {
                let row = self.insert(&insert)?;
                Ok(QueryResult::Done(format!(
                    "Row {} inserted into {}",
                    row, insert.table
                )))
            }
            Request::Select(select) => self.select(&select).map(QueryResult::Rows),
            Request::CreateIndex(create) => {
                let info = self.create_index(&create)?;
                Ok(QueryResult::Done(format!(
                    "Index {} created with {} rows",
                    info.name, info.row_count
                )))
            }
            Request::ShowTable(name) => self.show_table(&name).map(QueryResult::Table),
            Request::Delete => Ok(QueryResult::Done(self.delete_rows())),
            Request::Drop => Ok(QueryResult::Done(self.drop_table())),
            Request::Quit => Ok(QueryResult::Done("Bye".to_string())),
        }
    }

    /// Create a table with an empty row store
    pub fn create_table(&mut self, create: &CreateTable) -> Result<()> {
        let schema = TableSchema::new(create.name.clone(), create.fields.clone());
        PersistentTable::create(&self.disk, schema)?;
        info!(table = %create.name, fields = create.fields.len(), "table created");
        Ok(())
    }

    /// Append one row; returns its row index
    pub fn insert(&mut self, insert: &Insert) -> Result<usize> {
        let mut table = PersistentTable::open(&self.disk, &insert.table)?;
        let row = table.append(&insert.values)?;
        table.close();
        debug!(table = %insert.table, row, "row inserted");
        Ok(row)
    }

    /// Run a SELECT
    pub fn select(&mut self, select: &Select) -> Result<ResultRows> {
        let query = Planner::new(&self.disk).plan(select)?;
        run(query)
    }

    /// Build a sorted index over columns of a table and persist it
    pub fn create_index(&mut self, create: &CreateIndex) -> Result<TableInfo> {
        if self.disk.exists(&create.name, ObjectKind::Index)
            || self.disk.exists(&create.name, ObjectKind::Table)
        {
            return Err(Error::TableAlreadyExists(create.name.clone()));
        }
        let mut source = PersistentTable::open(&self.disk, &create.source_table)?;
        let built = index::build(&create.name, &mut source, &create.columns)?;
        source.close();
        index::persist(&self.disk, &built)?;
        Ok(built.schema().info())
    }

    /// Describe a table, or an index of that name
    pub fn show_table(&self, name: &str) -> Result<TableInfo> {
        match self.disk.read_schema(name, ObjectKind::Table) {
            Err(Error::SchemaNotFound(_)) => self
                .disk
                .read_schema(name, ObjectKind::Index)
                .map(|schema| schema.info()),
            other => other.map(|schema| schema.info()),
        }
    }

    /// Rows are never deleted
    pub fn delete_rows(&mut self) -> String {
        debug!("delete ignored");
        "DELETE".to_string()
    }

    /// Tables are never dropped
    pub fn drop_table(&mut self) -> String {
        debug!("drop ignored");
        "DROP".to_string()
    }
}

/// Execute a resolved query
pub fn run(query: Query) -> Result<ResultRows> {
    let Query {
        mut tables,
        fields,
        conditions,
    } = query;
    let columns: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();

    if tables.len() == 1 {
        let table = tables.remove(0);
        let projection: Vec<usize> = fields.iter().map(|f| f.col).collect();
        return match table {
            Table::Persistent(_) => {
                debug!(table = %table.name(), "single table scan");
                Ok(ResultRows::new(
                    columns,
                    FilterScan::new(table, conditions, projection),
                ))
            }
            Table::Materialized(index) => index_scan(index, columns, conditions, projection),
        };
    }

    join_query(tables, &fields, conditions, columns)
}

/// Scan of an opened index: all rows in key order, a key lookup, or a
/// filtered scan for any other condition shape
fn index_scan(
    index: MaterializedTable,
    columns: Vec<String>,
    conditions: Vec<Condition>,
    projection: Vec<usize>,
) -> Result<ResultRows> {
    if conditions.is_empty() {
        debug!(index = %index.schema().name, "index full scan");
        let rows = 0..index.row_count();
        return Ok(ResultRows::new(columns, Project::new(index, rows, projection)));
    }

    if let [Condition {
        left: Literal::Field { col: 0, .. },
        right: Literal::Constant(key),
        operator: Operator::Eq,
        conjunction: Conjunction::And,
    }] = conditions.as_slice()
    {
        let rows = index::lookup(&index, key)?;
        debug!(
            index = %index.schema().name,
            key = %key,
            matches = rows.len(),
            "index lookup"
        );
        return Ok(ResultRows::new(columns, Project::new(index, rows, projection)));
    }

    debug!(index = %index.schema().name, "index filtered scan");
    Ok(ResultRows::new(
        columns,
        FilterScan::new(index, conditions, projection),
    ))
}

fn join_query(
    mut tables: Vec<Table>,
    fields: &[QueryField],
    conditions: Vec<Condition>,
    columns: Vec<String>,
) -> Result<ResultRows> {
    let (joins, filters): (Vec<Condition>, Vec<Condition>) =
        conditions.into_iter().partition(Condition::is_join);

    let mut result_sets: ResultSets = tables
        .iter()
        .map(|t| (t.name().to_string(), ResultSet::new(t.row_count())))
        .collect();

    // With only ANDs the filters narrow each table before joining; an OR
    // can span tables, so then the whole fold runs on the joined rows.
    let push_down = filters.iter().all(|c| c.conjunction == Conjunction::And);
    if push_down {
        for condition in &filters {
            narrow(&mut tables, &mut result_sets, condition)?;
        }
        for (table, result_set) in &result_sets {
            debug!(table = %table, included = result_set.included(), "filters pushed down");
        }
    }
    debug!(
        joins = joins.len(),
        filters = filters.len(),
        push_down,
        "join plan"
    );

    let mut pending = Vec::with_capacity(tables.len());
    for table in tables.iter_mut() {
        let mask = result_sets[table.name()].mask().to_vec();
        pending.push(Some(materialize(table, &mask)?));
    }
    drop(tables);

    let mut joined: Option<JoinedTable> = None;
    for condition in &joins {
        let (mut left, mut right) = match (condition.left.field(), condition.right.field()) {
            (Some(left), Some(right)) => (left, right),
            _ => continue,
        };

        let mut current = match joined.take() {
            Some(current) => current,
            None => JoinedTable::seed(left.0, take(&mut pending, left.0)?),
        };
        if !current.contains(left.0) && current.contains(right.0) {
            std::mem::swap(&mut left, &mut right);
        }
        if !current.contains(left.0) {
            current = current.cross_join(left.0, take(&mut pending, left.0)?)?;
        }

        let left_col = current.column_of(left.0, left.1)?;
        current = if current.contains(right.0) {
            let right_col = current.column_of(right.0, right.1)?;
            current.filter_equal(left_col, right_col)?
        } else {
            current.inner_join(left_col, right.0, take(&mut pending, right.0)?, right.1)?
        };
        joined = Some(current);
    }

    // Tables no join condition mentions
    for (id, slot) in pending.iter_mut().enumerate() {
        if let Some(table) = slot.take() {
            joined = Some(match joined.take() {
                Some(current) => current.cross_join(id, table)?,
                None => JoinedTable::seed(id, table),
            });
        }
    }
    let joined = joined.ok_or_else(|| Error::Parse("SELECT needs at least one table".to_string()))?;

    let projection = fields
        .iter()
        .map(|f| joined.column_of(f.table, f.col))
        .collect::<Result<Vec<_>>>()?;

    if push_down {
        let table = joined.into_table();
        let rows = 0..table.row_count();
        return Ok(ResultRows::new(columns, Project::new(table, rows, projection)));
    }

    let filters = filters
        .iter()
        .map(|c| c.remap(|table, col| Ok((0, joined.column_of(table, col)?))))
        .collect::<Result<Vec<_>>>()?;
    Ok(ResultRows::new(
        columns,
        FilterScan::new(joined.into_table(), filters, projection),
    ))
}

/// AND one filter condition into the mask of the table it reads
fn narrow(tables: &mut [Table], result_sets: &mut ResultSets, condition: &Condition) -> Result<()> {
    match condition.owner() {
        Some(id) => {
            let table = &mut tables[id];
            let result_set = result_sets
                .get_mut(table.name())
                .ok_or_else(|| Error::SchemaNotFound(table.name().to_string()))?;
            result_set.narrow(|row| condition.matches(&mut |_, col| table.decode_cell(row, col)))
        }
        None => {
            // Constant against constant holds for every row or none
            if !condition.matches(&mut |_, _| Ok(String::new()))? {
                result_sets.values_mut().for_each(ResultSet::clear);
            }
            Ok(())
        }
    }
}

fn take(pending: &mut [Option<MaterializedTable>], id: TableId) -> Result<MaterializedTable> {
    pending
        .get_mut(id)
        .and_then(Option::take)
        .ok_or_else(|| Error::Corrupted(format!("table {} joined twice", id)))
}

fn project<S: RowSource>(source: &mut S, row: usize, projection: &[usize]) -> Result<Row> {
    projection
        .iter()
        .map(|&col| source.decode_cell(row, col))
        .collect()
}

/// Projects a given sequence of rows
struct Project<S, I> {
    source: S,
    rows: I,
    projection: Vec<usize>,
}

impl<S, I> Project<S, I> {
    fn new(source: S, rows: I, projection: Vec<usize>) -> Self {
        Self {
            source,
            rows,
            projection,
        }
    }
}

impl<S: RowSource, I: Iterator<Item = usize>> Iterator for Project<S, I> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(project(&mut self.source, row, &self.projection))
    }
}

/// Evaluates the condition fold on every row and projects the survivors
struct FilterScan<S> {
    source: S,
    conditions: Vec<Condition>,
    projection: Vec<usize>,
    next: usize,
    failed: bool,
}

impl<S: RowSource> FilterScan<S> {
    fn new(source: S, conditions: Vec<Condition>, projection: Vec<usize>) -> Self {
        Self {
            source,
            conditions,
            projection,
            next: 0,
            failed: false,
        }
    }

    fn accept(&mut self, row: usize) -> Result<bool> {
        let source = &mut self.source;
        fold(&self.conditions, |_, col| source.decode_cell(row, col))
    }
}

impl<S: RowSource> Iterator for FilterScan<S> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.failed && self.next < self.source.row_count() {
            let row = self.next;
            self.next += 1;
            match self.accept(row) {
                Ok(true) => return Some(project(&mut self.source, row, &self.projection)),
                Ok(false) => continue,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldDescriptor;
    use tempfile::TempDir;

    fn create_engine() -> (TempDir, ExecutionEngine) {
        let dir = TempDir::new().unwrap();
        let engine = ExecutionEngine::new(EngineConfig::new().data_dir(dir.path())).unwrap();
        (dir, engine)
    }

    fn insert(engine: &mut ExecutionEngine, table: &str, values: &[&str]) {
        engine
            .insert(&Insert {
                table: table.to_string(),
                values: values.iter().map(|v| v.to_string()).collect(),
            })
            .unwrap();
    }

    fn setup_people(engine: &mut ExecutionEngine) {
        engine
            .create_table(&CreateTable {
                name: "people".to_string(),
                fields: vec![
                    FieldDescriptor::integer("id"),
                    FieldDescriptor::char("name", 8),
                    FieldDescriptor::char("city", 8),
                ],
            })
            .unwrap();
        for row in [
            ["1", "ann", "oslo"],
            ["2", "bob", "rome"],
            ["3", "cid", "oslo"],
            ["4", "dee", "lima"],
        ] {
            insert(engine, "people", &row);
        }
    }

    fn rows(engine: &mut ExecutionEngine, select: Select) -> Vec<Row> {
        engine.select(&select).unwrap().collect_rows().unwrap()
    }

    #[test]
    fn test_select_all_in_insert_order() {
        let (_dir, mut engine) = create_engine();
        setup_people(&mut engine);

        let result = engine
            .select(&Select::new(["name", "id"], ["people"]))
            .unwrap();
        assert_eq!(result.columns(), &["name", "id"]);
        assert_eq!(
            result.collect_rows().unwrap(),
            vec![
                vec!["ann", "1"],
                vec!["bob", "2"],
                vec!["cid", "3"],
                vec!["dee", "4"]
            ]
        );
    }

    #[test]
    fn test_select_with_conditions() {
        let (_dir, mut engine) = create_engine();
        setup_people(&mut engine);

        let oslo = rows(
            &mut engine,
            Select::new(["name"], ["people"]).and("city", "=", "\"oslo\""),
        );
        assert_eq!(oslo, vec![vec!["ann"], vec!["cid"]]);

        let and = rows(
            &mut engine,
            Select::new(["name"], ["people"])
                .and("city", "=", "\"oslo\"")
                .and("id", "=", "3"),
        );
        assert_eq!(and, vec![vec!["cid"]]);

        let or = rows(
            &mut engine,
            Select::new(["name"], ["people"])
                .and("city", "=", "\"rome\"")
                .or("id", "=", "4"),
        );
        assert_eq!(or, vec![vec!["bob"], vec!["dee"]]);

        let none = rows(
            &mut engine,
            Select::new(["name"], ["people"]).and("\"nowhere\"", "=", "city"),
        );
        assert!(none.is_empty());
    }

    #[test]
    fn test_execute_dispatch() {
        let (_dir, mut engine) = create_engine();
        setup_people(&mut engine);

        match engine.execute(Request::ShowTable("people".to_string())).unwrap() {
            QueryResult::Table(info) => {
                assert_eq!(info.row_count, 4);
                assert_eq!(info.row_size, 8 + 9 + 9);
            }
            other => panic!("Expected table info, got {:?}", other),
        }
        assert!(matches!(
            engine.execute(Request::Delete).unwrap(),
            QueryResult::Done(_)
        ));
        assert!(matches!(
            engine.execute(Request::Drop).unwrap(),
            QueryResult::Done(_)
        ));
        assert!(matches!(
            engine.execute(Request::ShowTable("nope".to_string())),
            Err(Error::SchemaNotFound(_))
        ));
    }

    #[test]
    fn test_index_scan_paths() {
        let (_dir, mut engine) = create_engine();
        setup_people(&mut engine);
        engine
            .create_index(&CreateIndex {
                name: "by_city".to_string(),
                columns: vec!["city".to_string(), "name".to_string()],
                source_table: "people".to_string(),
            })
            .unwrap();

        let all = rows(&mut engine, Select::new(["city", "name"], ["by_city"]));
        assert_eq!(
            all,
            vec![
                vec!["lima", "dee"],
                vec!["oslo", "ann"],
                vec!["oslo", "cid"],
                vec!["rome", "bob"],
            ]
        );

        let hit = rows(
            &mut engine,
            Select::new(["name"], ["by_city"]).and("city", "=", "\"oslo\""),
        );
        assert_eq!(hit, vec![vec!["ann"], vec!["cid"]]);

        let miss = rows(
            &mut engine,
            Select::new(["name"], ["by_city"]).and("city", "=", "\"paris\""),
        );
        assert!(miss.is_empty());

        // Not a lookup on the key column, falls back to a scan
        let by_name = rows(
            &mut engine,
            Select::new(["city"], ["by_city"]).and("name", "=", "\"bob\""),
        );
        assert_eq!(by_name, vec![vec!["rome"]]);
    }

    #[test]
    fn test_create_index_twice() {
        let (_dir, mut engine) = create_engine();
        setup_people(&mut engine);
        let create = CreateIndex {
            name: "by_name".to_string(),
            columns: vec!["name".to_string()],
            source_table: "people".to_string(),
        };
        engine.create_index(&create).unwrap();
        assert!(matches!(
            engine.create_index(&create),
            Err(Error::TableAlreadyExists(_))
        ));
    }
}
