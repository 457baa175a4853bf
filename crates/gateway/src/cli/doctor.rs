use rt_domain::config::{Config, ConfigSeverity};

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("roundtable doctor");
    println!("=================\n");

    let mut all_passed = true;

    // 1. Config file
    check_config_file(config_path, &mut all_passed);

    // 2. Config validation
    check_config_validation(config, &mut all_passed);

    // 3. Backend connectivity + configured model
    check_backend(config, &mut all_passed).await;

    // Summary
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

async fn check_backend(config: &Config, all_passed: &mut bool) {
    let url = format!(
        "{}/api/tags",
        config.backend.base_url.trim_end_matches('/')
    );

    let response = match reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
    {
        Ok(client) => client.get(&url).send().await.ok(),
        Err(_) => None,
    };

    let body: Option<serde_json::Value> = match response {
        Some(resp) if resp.status().is_success() => resp.json().await.ok(),
        _ => None,
    };

    let reachable = body.is_some();
    print_check(
        "Backend reachable",
        reachable,
        if reachable {
            config.backend.base_url.clone()
        } else {
            format!("{} (unreachable)", config.backend.base_url)
        },
    );
    if !reachable {
        *all_passed = false;
        return;
    }

    // Configured model present?
    let model_found = body
        .as_ref()
        .and_then(|b| b.get("models"))
        .and_then(|m| m.as_array())
        .map(|models| {
            models
                .iter()
                .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
                .any(|name| name == config.backend.model)
        })
        .unwrap_or(false);

    print_check(
        "Configured model available",
        model_found,
        if model_found {
            config.backend.model.clone()
        } else {
            format!("{} (not installed on the backend)", config.backend.model)
        },
    );
    if !model_found {
        *all_passed = false;
    }
}

// ── Formatting helper ─────────────────────────────────────────────────

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
