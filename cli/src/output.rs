use gql_migrate_lib::pipeline::MigrationReport;
use gql_migrate_lib::report;

pub fn print_catalog(migration: &MigrationReport, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&migration.catalog).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        println!("{}", report::format_catalog(&migration.catalog));
    }
}

pub fn print_analysis(migration: &MigrationReport, json: bool) {
    match &migration.deprecations {
        Some(summary) if json => {
            println!(
                "{}",
                serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string())
            );
        }
        Some(summary) => println!("{}", report::format_deprecation_summary(summary)),
        None => println!("No schema supplied; nothing to analyze."),
    }
}

pub fn print_report(migration: &MigrationReport, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(migration).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        println!("{}", report::format_report(migration));
    }
}
