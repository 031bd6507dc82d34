use super::Command;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use frankenstein::Message;
use typed_builder::TypedBuilder;

static COMMAND: &str = "/help";

const HELP_TEXT: &str = "<b>Channels</b>\n\
/add &lt;@username|t.me link&gt; - track a channel\n\
/remove &lt;id&gt; - stop tracking\n\
/list - tracked channels\n\
/channel &lt;id&gt; weight &lt;0.1-2.0&gt; | auto | delta &lt;d&gt; | pause | resume\n\
/discoveries [approve &lt;id&gt; | reject &lt;id&gt;] - candidate channels\n\
\n\
<b>Digest</b>\n\
/digest - build and post now\n\
/schedule [set &lt;json&gt; | window &lt;minutes&gt;] - firing times\n\
\n\
<b>Pipeline</b>\n\
/filters [mode|allow|deny|minlen|forwards|ads] - message filters\n\
/thresholds [relevance|importance] &lt;0-1&gt;\n\
/retry [confirm | &lt;item_id&gt;] - reprocess failed items\n\
\n\
<b>Feedback</b>\n\
/rate &lt;item_id&gt; &lt;good|bad|irrelevant&gt; [comment]\n\
/annotate enqueue [hours] [limit] | assign | label &lt;l&gt; | skip\n\
\n\
<b>Ops</b>\n\
/llm costs | override &lt;task&gt; &lt;model&gt; | budget &lt;tokens&gt;\n\
/system errors | history | status";

#[derive(TypedBuilder)]
pub struct Help {}

impl Command for Help {
    fn response(&self, _db_pool: Pool<ConnectionManager<PgConnection>>, _message: &Message) -> String {
        HELP_TEXT.to_string()
    }
}

impl Help {
    pub fn command() -> &'static str {
        COMMAND
    }
}
