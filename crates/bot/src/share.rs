use anyhow::Result;
use url::Url;

const TWEET_INTENT_URL: &str = "https://twitter.com/intent/tweet";

/// Recruiting post text that advertises the session's server.
pub fn recruiting_text(guild_name: &str, invite_url: &str, hashtags: &[String]) -> String {
    [
        format!("【プラベ募】{guild_name}サーバーでプラベ募集中！"),
        "だれでも歓迎🙌".to_string(),
        String::new(),
        hashtags.join(" "),
        invite_url.to_string(),
    ]
    .join("\n")
}

pub fn tweet_intent_url(guild_name: &str, invite_url: &str, hashtags: &[String]) -> Result<Url> {
    let text = recruiting_text(guild_name, invite_url, hashtags);
    Ok(Url::parse_with_params(TWEET_INTENT_URL, &[("text", text)])?)
}
