use async_trait::async_trait;

use super::CommandAction;
use crate::args::Arguments;
use crate::context::CommandContext;

/// Action of a `[run] respond = "..."` command: fills the template and responds.
///
/// `{author}` becomes a mention of the invoker, `{label}` the name or alias
/// used, and `{<argument>}` the resolved argument. Unknown placeholders are
/// left as written.
#[derive(Debug, Clone)]
pub struct TemplateAction {
    template: String,
}

impl TemplateAction {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn render(&self, ctx: &CommandContext, args: &Arguments) -> String {
        let mut output = self
            .template
            .replace("{author}", &format!("<@{}>", ctx.message().author.id))
            .replace("{label}", ctx.label());
        for (name, value) in args.iter() {
            output = output.replace(&format!("{{{}}}", name), &value.to_string());
        }
        output
    }
}

#[async_trait]
impl CommandAction for TemplateAction {
    async fn run(&self, ctx: &CommandContext, args: &Arguments) -> miette::Result<()> {
        ctx.respond(&self.render(ctx, args)).await?;
        Ok(())
    }
}
