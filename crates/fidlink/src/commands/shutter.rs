//! `shutter-test`: cycle the NIR shutters on a set of spectrographs.

use std::sync::Arc;
use std::time::Duration;

use dialoguer::Confirm;
use serde::Serialize;
use tabled::Tabled;

use fidlink_core::{ShutterAction, ShutterBank, Spectrograph, SpectrographTarget};

use crate::cli::{GlobalOpts, ShutterTestArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

const QUEUE_CAPACITY: usize = 8;

#[derive(Debug, Serialize)]
struct Prepared {
    spectrograph: String,
    powered_on: bool,
    deflated: bool,
}

#[derive(Tabled)]
struct PreparedRow {
    #[tabled(rename = "Spectrograph")]
    spectrograph: String,
    #[tabled(rename = "Powered on")]
    powered_on: String,
    #[tabled(rename = "Seal deflated")]
    deflated: String,
}

fn yes_no(changed: bool) -> String {
    if changed { "yes" } else { "already" }.to_owned()
}

fn to_row(p: &Prepared) -> PreparedRow {
    PreparedRow {
        spectrograph: p.spectrograph.clone(),
        powered_on: yes_no(p.powered_on),
        deflated: yes_no(p.deflated),
    }
}

fn parse_targets(raw: &[String]) -> Result<Vec<SpectrographTarget>, CliError> {
    raw.iter()
        .map(|t| {
            t.parse::<SpectrographTarget>()
                .map_err(|e| CliError::Validation {
                    field: "target".into(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

fn request_timeout(global: &GlobalOpts) -> Duration {
    let secs = global.timeout.unwrap_or_else(|| {
        config::load(global)
            .map(|cfg| cfg.defaults.timeout)
            .unwrap_or(30)
    });
    Duration::from_secs(secs)
}

pub async fn handle(args: ShutterTestArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let targets = parse_targets(&args.targets)?;
    let timeout = request_timeout(global);
    let color = output::should_color(global.color);

    let spectrographs: Vec<Arc<Spectrograph>> = targets
        .into_iter()
        .map(|t| Arc::new(Spectrograph::connect(t, timeout)))
        .collect();

    if !args.skip_prepare {
        let mut prepared = Vec::with_capacity(spectrographs.len());
        for spectrograph in &spectrographs {
            let prep = spectrograph.prepare().await?;
            prepared.push(Prepared {
                spectrograph: spectrograph.name().to_owned(),
                powered_on: prep.powered_on,
                deflated: prep.deflated,
            });
        }
        output::print_output(&output::render_list(global.output, &prepared, to_row));
    }

    let bank = ShutterBank::new(spectrographs, QUEUE_CAPACITY);
    let result = cycle(&bank, &args, color).await;
    bank.shutdown().await;
    result
}

async fn cycle(bank: &ShutterBank, args: &ShutterTestArgs, color: bool) -> Result<(), CliError> {
    for n in 1..=args.cycles {
        if args.confirm && n > 1 {
            let go = Confirm::new()
                .with_prompt(format!("Run cycle {n} of {}?", args.cycles))
                .default(true)
                .interact()?;
            if !go {
                break;
            }
        }

        bank.send_all(ShutterAction::Open).await?;
        tokio::time::sleep(args.dwell).await;
        bank.send_all(ShutterAction::Close).await?;
        output::print_done(
            &format!("cycle {n}/{} queued on {} spectrograph(s)", args.cycles, bank.len()),
            color,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_parse_or_report_the_bad_one() {
        let ok = parse_targets(&["SP5@10.0.0.5:35436".into(), "SP6@[::1]:1".into()])
            .expect("valid targets");
        assert_eq!(ok.len(), 2);
        assert_eq!(ok[1].host, "::1");

        let err = parse_targets(&["SP5-no-address".into()]).expect_err("invalid");
        assert!(matches!(err, CliError::Validation { .. }));
    }
}
