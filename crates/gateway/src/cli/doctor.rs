use grov_domain::config::{Config, ConfigSeverity};

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("grov doctor");
    println!("===========\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_upstream(config, &mut all_passed).await;
    check_aux_llm_roles(config, &mut all_passed);
    check_store_path(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

// ── Individual checks ─────────────────────────────────────────────────

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({} error(s))", issues.len(), error_count),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

async fn check_upstream(config: &Config, all_passed: &mut bool) {
    let url = &config.upstream.base_url;
    let reachable = match reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
    {
        Ok(client) => client.get(url).send().await.is_ok(),
        Err(_) => false,
    };

    print_check(
        "Upstream reachable",
        reachable,
        if reachable {
            url.clone()
        } else {
            format!("{url} (unreachable)")
        },
    );

    if !reachable {
        *all_passed = false;
    }
}

/// Missing aux-LLM roles degrade gracefully to heuristics rather than
/// block the proxy, so this check is informational only — it never fails
/// the overall `all_passed` result.
fn check_aux_llm_roles(config: &Config, _all_passed: &mut bool) {
    let count = config.llm.roles.len();
    let ok = count > 0;

    print_check(
        "Auxiliary LLM roles configured",
        ok,
        if ok {
            format!("{count} role(s)")
        } else {
            "none configured (helpers fall back to heuristics)".into()
        },
    );
}

fn check_store_path(config: &Config, all_passed: &mut bool) {
    let path = std::path::Path::new(&config.store.db_path);
    let parent_writable = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.exists() || std::fs::create_dir_all(p).is_ok())
        .unwrap_or(true);

    print_check(
        "Store path writable",
        parent_writable,
        config.store.db_path.clone(),
    );

    if !parent_writable {
        *all_passed = false;
    }
}

// ── Formatting helper ─────────────────────────────────────────────────

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
