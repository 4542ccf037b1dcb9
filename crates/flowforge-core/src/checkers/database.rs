//! Database migration rules.

use crate::domain::{Finding, RuleResult, StagedFile};

use super::{CheckInput, Checker, CheckerKind, Tally, Wording};

const MIGRATION_DIRS: &[&str] = &["migrations", "migration", "migrate"];
const DB_DOC_DIRS: &[&str] = &["documentation/database/", "docs/database/"];

/// SQL file inside a migrations directory.
pub fn is_migration(file: &StagedFile) -> bool {
    file.extension() == Some("sql")
        && file
            .dir()
            .split('/')
            .any(|segment| MIGRATION_DIRS.contains(&segment))
}

fn is_schema_file(file: &StagedFile) -> bool {
    is_migration(file) || (file.extension() == Some("sql") && file.file_name() == "schema.sql")
}

fn line_of(content: &str, offset: usize) -> u32 {
    content[..offset].matches('\n').count() as u32 + 1
}

/// Rule 10: schema changes are mirrored in the database documentation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DbConsistency;

impl Checker for DbConsistency {
    fn kind(&self) -> CheckerKind {
        CheckerKind::DbConsistency
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let mut tally = Tally::default();
        let documented = input
            .changeset
            .live_files()
            .any(|f| DB_DOC_DIRS.iter().any(|d| f.path.starts_with(d)));

        if !documented {
            for file in input.changeset.live_files().filter(|f| is_migration(f)) {
                tally.warn(Finding::at(
                    &file.path,
                    "migration staged without a documentation/database/ update",
                ));
            }
        }

        tally.finish(
            self.kind(),
            Wording {
                pass: "database documentation consistent with migrations",
                block: "database documentation out of date",
                warn: "migrations without database documentation",
                fix: "Describe the schema change under documentation/database/".to_string(),
            },
        )
    }
}

/// Rule 19: destructive migrations carry a rollback.
#[derive(Debug, Clone, Copy, Default)]
pub struct DbChangeProtocol;

fn has_rollback_section(content: &str) -> bool {
    static_regex!(r"(?im)^\s*--\s*(?:\+migrate\s+)?(?:down|rollback)\b").is_match(content)
}

/// Paired `*.down.sql` for an `*.up.sql` migration.
fn down_companion(file: &StagedFile) -> Option<String> {
    let stem = file.path.strip_suffix(".up.sql")?;
    Some(format!("{stem}.down.sql"))
}

impl Checker for DbChangeProtocol {
    fn kind(&self) -> CheckerKind {
        CheckerKind::DbChangeProtocol
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let mut tally = Tally::default();
        let destructive = static_regex!(r"(?i)\b(?:DROP\s+TABLE|DROP\s+COLUMN|TRUNCATE)\b");

        for file in input.changeset.live_files() {
            if !is_migration(file) || file.path.ends_with(".down.sql") {
                continue;
            }
            let Some(content) = file.content.as_deref() else {
                continue;
            };
            let Some(hit) = destructive.find(content) else {
                continue;
            };

            let companion = down_companion(file).is_some_and(|down| {
                match input.changeset.get(&down) {
                    Some(staged) => !staged.is_deleted(),
                    None => input.workspace.is_file(&down),
                }
            });
            if !has_rollback_section(content) && !companion {
                tally.block(Finding::at_line(
                    &file.path,
                    line_of(content, hit.start()),
                    format!("destructive statement '{}' without a rollback", hit.as_str()),
                ));
            }
        }

        tally.finish(
            self.kind(),
            Wording {
                pass: "destructive migrations are reversible",
                block: "destructive migrations without rollback",
                warn: "destructive migrations without rollback",
                fix: "Add a '-- down' (or '-- rollback') section that restores the dropped data or structure"
                    .to_string(),
            },
        )
    }
}

/// Rule 32: table conventions for new tables.
#[derive(Debug, Clone)]
pub struct DbStandards {
    required_columns: Vec<String>,
}

impl DbStandards {
    pub fn new() -> Self {
        Self::with_required_columns(&["created_at", "updated_at"])
    }

    pub fn with_required_columns(columns: &[&str]) -> Self {
        Self {
            required_columns: columns.iter().map(|c| c.to_ascii_lowercase()).collect(),
        }
    }
}

impl Default for DbStandards {
    fn default() -> Self {
        Self::new()
    }
}

/// A `CREATE TABLE` statement: line, table name, column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub line: u32,
    pub name: String,
    pub body: String,
}

/// Extract `CREATE TABLE` statements, matching parentheses so column types
/// like `VARCHAR(255)` stay inside the body.
pub fn table_definitions(content: &str) -> Vec<TableDefinition> {
    let head = static_regex!(
        r#"(?i)\bCREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:[`"\[]?\w+[`"\]]?\.)?[`"\[]?([A-Za-z_]\w*)[`"\]]?\s*\("#
    );

    let mut tables = Vec::new();
    for caps in head.captures_iter(content) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let mut depth = 1usize;
        let mut end = None;
        for (offset, ch) in content[whole.end()..].char_indices() {
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(whole.end() + offset);
                        break;
                    }
                }
                _ => {}
            }
        }
        let body_end = end.unwrap_or(content.len());
        tables.push(TableDefinition {
            line: line_of(content, whole.start()),
            name: name.as_str().to_string(),
            body: content[whole.end()..body_end].to_string(),
        });
    }
    tables
}

fn declares_column(body: &str, column: &str) -> bool {
    body.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .any(|word| word.eq_ignore_ascii_case(column))
}

impl Checker for DbStandards {
    fn kind(&self) -> CheckerKind {
        CheckerKind::DbStandards
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let mut tally = Tally::default();

        for file in input.changeset.live_files() {
            if !is_schema_file(file) || file.path.ends_with(".down.sql") {
                continue;
            }
            let Some(content) = file.content.as_deref() else {
                continue;
            };

            for table in table_definitions(content) {
                let missing: Vec<&str> = self
                    .required_columns
                    .iter()
                    .map(String::as_str)
                    .filter(|column| !declares_column(&table.body, column))
                    .collect();
                if !missing.is_empty() {
                    tally.block(Finding::at_line(
                        &file.path,
                        table.line,
                        format!("table '{}' is missing {}", table.name, missing.join(", ")),
                    ));
                }
                if !static_regex!(r"^[a-z][a-z0-9_]*$").is_match(&table.name) {
                    tally.warn(Finding::at_line(
                        &file.path,
                        table.line,
                        format!("table name '{}' is not snake_case", table.name),
                    ));
                }
            }
        }

        tally.finish(
            self.kind(),
            Wording {
                pass: "new tables follow database standards",
                block: "new tables missing required columns",
                warn: "table names break naming standards",
                fix: format!(
                    "Declare {} on every table and use snake_case table names",
                    self.required_columns.join(", ")
                ),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::test_support::Fixture;
    use crate::domain::{Changeset, Severity};
    use crate::workspace::MemoryWorkspace;

    fn fixture(files: Vec<StagedFile>) -> Fixture {
        Fixture::new(Changeset::new(files))
    }

    #[test]
    fn test_migration_detection() {
        assert!(is_migration(&StagedFile::added("db/migrations/001_init.sql", "")));
        assert!(is_migration(&StagedFile::added("migrations/001_init.sql", "")));
        assert!(!is_migration(&StagedFile::added("scripts/seed.sql", "")));
        assert!(!is_migration(&StagedFile::added("migrations/README.md", "")));
    }

    #[test]
    fn test_migration_without_db_docs_warns() {
        let fx = fixture(vec![StagedFile::added("migrations/002_orders.sql", "SELECT 1;\n")]);
        assert_eq!(DbConsistency.check(&fx.input()).severity, Severity::Warn);

        let fx = fixture(vec![
            StagedFile::added("migrations/002_orders.sql", "SELECT 1;\n"),
            StagedFile::added("documentation/database/orders.md", "# Orders\n"),
        ]);
        assert_eq!(DbConsistency.check(&fx.input()).severity, Severity::Pass);
    }

    #[test]
    fn test_destructive_migration_requires_rollback() {
        let fx = fixture(vec![StagedFile::added(
            "migrations/003_drop_legacy.sql",
            "-- up\nDROP TABLE legacy_orders;\n",
        )]);
        let result = DbChangeProtocol.check(&fx.input());
        assert!(result.is_block());
        assert_eq!(result.findings[0].line, Some(2));

        let fx = fixture(vec![StagedFile::added(
            "migrations/003_drop_legacy.sql",
            "-- up\nALTER TABLE orders DROP COLUMN note;\n\n-- down\nALTER TABLE orders ADD COLUMN note TEXT;\n",
        )]);
        assert_eq!(DbChangeProtocol.check(&fx.input()).severity, Severity::Pass);
    }

    #[test]
    fn test_down_companion_file_counts_as_rollback() {
        let mut fx = fixture(vec![StagedFile::added(
            "migrations/004_trim.up.sql",
            "TRUNCATE audit_events;\n",
        )]);
        assert!(DbChangeProtocol.check(&fx.input()).is_block());

        fx.workspace = MemoryWorkspace::new().with_file("migrations/004_trim.down.sql", "");
        assert_eq!(DbChangeProtocol.check(&fx.input()).severity, Severity::Pass);
    }

    #[test]
    fn test_table_definitions_keep_nested_parentheses() {
        let sql = "CREATE TABLE IF NOT EXISTS public.orders (\n  id SERIAL PRIMARY KEY,\n  note VARCHAR(255),\n  created_at TIMESTAMP\n);\n";
        let tables = table_definitions(sql);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "orders");
        assert!(tables[0].body.contains("created_at"));
    }

    #[test]
    fn test_tables_need_timestamps() {
        let fx = fixture(vec![StagedFile::added(
            "migrations/005_orders.sql",
            "CREATE TABLE orders (\n  id INTEGER PRIMARY KEY,\n  created_at TEXT\n);\n",
        )]);
        let result = DbStandards::new().check(&fx.input());
        assert!(result.is_block());
        assert!(result.findings[0].detail.contains("updated_at"));
        assert!(!result.findings[0].detail.contains("created_at"));
    }

    #[test]
    fn test_non_snake_case_table_warns() {
        let fx = fixture(vec![StagedFile::added(
            "migrations/006_items.sql",
            "CREATE TABLE OrderItems (id INT, created_at TEXT, updated_at TEXT);\n",
        )]);
        let result = DbStandards::new().check(&fx.input());
        assert_eq!(result.severity, Severity::Warn);
        assert!(result.findings[0].detail.contains("OrderItems"));
    }
}
