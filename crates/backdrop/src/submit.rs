use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use page::{ContactForm, FormState, ReqwestTransport};

use crate::cli::SubmitArgs;
use crate::paths::AppPaths;

pub fn run_submit(paths: &AppPaths, args: SubmitArgs) -> Result<ExitCode> {
    let scene = if args.action.is_some() && args.fallback_email.is_some() {
        None
    } else {
        paths.load_scene(args.scene.as_deref())?
    };
    let contact = scene.as_ref().and_then(|scene| scene.contact.as_ref());

    let Some(action) = args
        .action
        .or_else(|| contact.map(|c| c.action.clone()))
    else {
        bail!("no form action given; pass --action or add a [contact] section to the scene");
    };
    let Some(fallback_email) = args
        .fallback_email
        .or_else(|| contact.map(|c| c.fallback_email.clone()))
    else {
        bail!("no fallback address given; pass --fallback-email or add a [contact] section");
    };

    let transport = ReqwestTransport::new().context("failed to construct HTTP client")?;
    let mut form = ContactForm::new(action, fallback_email);
    for (name, value) in args.fields {
        form.add_field(name, value);
    }

    let status = form.submit_with(&transport, |status| println!("{}", status.message));
    Ok(match status.state {
        FormState::Sent => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}
