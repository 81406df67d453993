//! Scoped teardown for provisioned infrastructure

use super::{Terraform, TerraformError, TerraformOptions};

/// RAII guard that runs `terraform destroy` when dropped.
///
/// Create it *before* applying so that a failed or partial apply is still
/// torn down. Dropping runs destroy on every exit path, including panics in
/// the test body. Call [`Deployment::destroy`] to tear down explicitly and
/// observe the result instead.
///
/// The `provision`, `read_output` and `teardown` variants run the same
/// commands on tokio's blocking pool, for use from async code.
pub struct Deployment {
    terraform: Terraform,
    options: TerraformOptions,
    destroyed: bool,
}

impl Deployment {
    pub fn new(terraform: Terraform, options: TerraformOptions) -> Self {
        Self {
            terraform,
            options,
            destroyed: false,
        }
    }

    pub fn options(&self) -> &TerraformOptions {
        &self.options
    }

    /// Run `terraform init` and `terraform apply`
    pub fn init_and_apply(&self) -> Result<String, TerraformError> {
        self.terraform.init_and_apply(&self.options)
    }

    /// Read an output of the applied module
    pub fn output(&self, key: &str) -> Result<String, TerraformError> {
        self.terraform.output(&self.options, key)
    }

    /// Destroy now and report the outcome. Drop will not destroy again.
    pub fn destroy(mut self) -> Result<(), TerraformError> {
        self.destroyed = true;
        self.terraform.destroy(&self.options).map(|_| ())
    }

    pub async fn provision(&self) -> Result<String, TerraformError> {
        self.blocking(|terraform, options| terraform.init_and_apply(&options))
            .await
    }

    pub async fn read_output(&self, key: &str) -> Result<String, TerraformError> {
        let key = key.to_string();
        self.blocking(move |terraform, options| terraform.output(&options, &key))
            .await
    }

    /// Async [`Deployment::destroy`]
    pub async fn teardown(mut self) -> Result<(), TerraformError> {
        self.destroyed = true;
        self.blocking(|terraform, options| terraform.destroy(&options).map(|_| ()))
            .await
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, TerraformError>
    where
        F: FnOnce(Terraform, TerraformOptions) -> Result<T, TerraformError> + Send + 'static,
        T: Send + 'static,
    {
        let terraform = self.terraform.clone();
        let options = self.options.clone();
        let span = tracing::Span::current();
        tokio::task::spawn_blocking(move || span.in_scope(|| f(terraform, options))).await?
    }
}

impl Drop for Deployment {
    fn drop(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        if std::thread::panicking() {
            tracing::warn!(dir = %self.options.dir.display(), "Destroying after panic");
        }

        if let Err(e) = self.terraform.destroy(&self.options) {
            tracing::error!(
                dir = %self.options.dir.display(),
                error = %e,
                "terraform destroy failed; resources may have leaked"
            );
        }
    }
}
