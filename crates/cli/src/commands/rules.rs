//! Rules command - manage auto-post rules

use anyhow::Result;
use postpilot_domain::AutoPostRule;
use postpilot_domain::usecases::{NewRule, RulePatch};
use std::path::PathBuf;

use crate::app::App;
use crate::args::{RuleCreateArgs, RuleUpdateArgs, RulesArgs, RulesCommands};
use crate::commands::{clearable, format_timestamp, parse_timezone, print_json};

pub async fn execute(args: RulesArgs, config_path: Option<PathBuf>) -> Result<()> {
    let app = App::open(config_path.as_deref()).await?;
    let rules = app.rules();

    match args.command {
        RulesCommands::Create(args) => {
            let json = args.json;
            let rule = rules.create(new_rule(args)?).await?;
            output_rule(&rule, json)?;
        }
        RulesCommands::Update(args) => {
            let json = args.json;
            let id = args.id;
            let rule = rules.update(id, rule_patch(args)?).await?;
            output_rule(&rule, json)?;
        }
        RulesCommands::List { account, json } => {
            let list = rules.list(account).await?;
            if json {
                print_json(&list)?;
            } else if list.is_empty() {
                println!("No rules for account {}.", account);
            } else {
                for rule in &list {
                    println!(
                        "{}  {}  {} {}  next {}{}",
                        rule.id,
                        rule.name,
                        rule.frequency,
                        format_times(rule),
                        format_timestamp(rule.next_run_at),
                        if rule.enabled { "" } else { "  (disabled)" }
                    );
                }
            }
        }
        RulesCommands::Show { id, json } => {
            let rule = rules.get(id).await?;
            output_rule(&rule, json)?;
        }
        RulesCommands::Delete { id } => {
            rules.delete(id).await?;
            println!("Deleted rule {}", id);
        }
    }

    Ok(())
}

fn new_rule(args: RuleCreateArgs) -> Result<NewRule> {
    let mut rule = NewRule::new(args.account, args.name, args.frequency, args.times);
    rule.description = args.description;
    rule.enabled = !args.disabled;
    if let Some(ref tz) = args.timezone {
        rule.timezone = parse_timezone(tz)?;
    }
    rule.auto_generate = !args.no_generate;
    rule.topic = args.topic;
    rule.custom_prompt = args.custom_prompt;
    rule.is_thread = args.thread;
    rule.ai_model = args.model;
    rule.max_runs = args.max_runs;
    Ok(rule)
}

fn rule_patch(args: RuleUpdateArgs) -> Result<RulePatch> {
    let enabled = if args.enable {
        Some(true)
    } else if args.disable {
        Some(false)
    } else {
        None
    };

    Ok(RulePatch {
        name: args.name,
        description: clearable(args.description),
        enabled,
        frequency: args.frequency,
        scheduled_times: args.times,
        timezone: args.timezone.as_deref().map(parse_timezone).transpose()?,
        auto_generate: args.auto_generate,
        topic: clearable(args.topic),
        custom_prompt: clearable(args.custom_prompt),
        is_thread: args.thread,
        ai_model: args.model,
        max_runs: args.max_runs.map(|n| (n > 0).then_some(n)),
    })
}

fn format_times(rule: &AutoPostRule) -> String {
    rule.scheduled_times
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn output_rule(rule: &AutoPostRule, json: bool) -> Result<()> {
    if json {
        return print_json(rule);
    }

    println!("{}  {}", rule.id, rule.name);
    if let Some(ref description) = rule.description {
        println!("  {}", description);
    }
    println!("  Account:   {}", rule.account_id);
    println!(
        "  Schedule:  {} {} ({})",
        rule.frequency,
        format_times(rule),
        rule.timezone
    );
    println!("  Enabled:   {}", rule.enabled);
    println!(
        "  Generate:  {} via {}{}",
        rule.auto_generate,
        rule.ai_model,
        if rule.is_thread { ", thread" } else { "" }
    );
    if let Some(ref topic) = rule.topic {
        println!("  Topic:     {}", topic);
    }
    match rule.max_runs {
        Some(max) => println!("  Runs:      {}/{}", rule.run_count, max),
        None => println!("  Runs:      {}", rule.run_count),
    }
    println!("  Next run:  {}", format_timestamp(rule.next_run_at));
    if let Some(at) = rule.last_run_at {
        println!("  Last run:  {} ({})", format_timestamp(at), rule.run_state.as_str());
    }
    if let Some(ref error) = rule.last_error {
        println!("  Error:     {}", error);
    }
    Ok(())
}
