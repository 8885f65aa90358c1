fn main() {
    let args = std::env::args();

    match stacksnap::run(args) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            match err.downcast_ref::<stacksnap::Error>() {
                Some(stacksnap::Error::Usage(message)) => eprint!("{message}"),
                _ => {
                    tracing::error!(error = %format!("{err:#}"), "stacksnap aborted");
                    eprintln!("stacksnap error: {err:#}");
                }
            }
            std::process::exit(stacksnap::exit_code_for(&err));
        }
    }
}
