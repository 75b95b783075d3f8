//! Idempotent schema migrations.
//!
//! Creates the financial tables the schema indexer describes and the
//! `query_logs` audit table. All statements use `CREATE ... IF NOT EXISTS`
//! so `finq init` can be run repeatedly.

use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS companies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            ticker TEXT UNIQUE,
            sector TEXT,
            industry TEXT,
            description TEXT,
            founded_date TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS financial_statements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id INTEGER NOT NULL,
            statement_date TEXT NOT NULL,
            period_type TEXT,
            fiscal_year INTEGER,
            revenue REAL,
            cost_of_revenue REAL,
            gross_profit REAL,
            operating_expenses REAL,
            ebitda REAL,
            operating_income REAL,
            net_income REAL,
            eps REAL,
            total_assets REAL,
            current_assets REAL,
            total_liabilities REAL,
            current_liabilities REAL,
            shareholders_equity REAL,
            operating_cash_flow REAL,
            investing_cash_flow REAL,
            financing_cash_flow REAL,
            free_cash_flow REAL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (company_id) REFERENCES companies(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS portfolio_companies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id INTEGER NOT NULL,
            investment_date TEXT NOT NULL,
            exit_date TEXT,
            investment_amount REAL,
            current_valuation REAL,
            ownership_percentage REAL,
            investment_stage TEXT,
            status TEXT,
            notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (company_id) REFERENCES companies(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS performance_metrics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            portfolio_company_id INTEGER NOT NULL,
            metric_date TEXT NOT NULL,
            arr REAL,
            mrr REAL,
            customer_count INTEGER,
            churn_rate REAL,
            cac REAL,
            ltv REAL,
            burn_rate REAL,
            runway_months REAL,
            revenue_multiple REAL,
            ebitda_multiple REAL,
            notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (portfolio_company_id) REFERENCES portfolio_companies(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS market_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticker TEXT NOT NULL,
            date TEXT NOT NULL,
            open_price REAL,
            high_price REAL,
            low_price REAL,
            close_price REAL,
            volume INTEGER,
            adj_close REAL,
            ma_50 REAL,
            ma_200 REAL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Audit sink: one row per completed request, never updated.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS query_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_query TEXT NOT NULL,
            generated_sql TEXT,
            sql_result TEXT,
            final_answer TEXT,
            context_used TEXT,
            agent_reasoning TEXT,
            execution_time_ms REAL,
            success INTEGER NOT NULL DEFAULT 1,
            error_message TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_statements_company ON financial_statements(company_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_portfolio_company ON portfolio_companies(company_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_metrics_portfolio ON performance_metrics(portfolio_company_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_market_data_ticker ON market_data(ticker)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_query_logs_created ON query_logs(created_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
