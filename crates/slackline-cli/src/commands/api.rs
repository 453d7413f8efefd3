use anyhow::{anyhow, bail, Context, Result};
use reqwest::Method;

/// Split `-F key=value` fields. Values may contain `=`; they may not be empty.
pub fn parse_fields(fields: &[String]) -> Result<Vec<(String, String)>> {
    fields
        .iter()
        .map(|field| match field.split_once('=') {
            Some((key, value)) if !key.is_empty() && !value.is_empty() => {
                Ok((key.to_string(), value.to_string()))
            }
            _ => Err(anyhow!("field {:?} is missing a value", field)),
        })
        .collect()
}

/// `[verb] path`: without a verb, GET unless a body is given.
pub fn method_and_path(args: &[String], has_body: bool) -> Result<(Method, String)> {
    match args {
        [path] => Ok((if has_body { Method::POST } else { Method::GET }, path.clone())),
        [verb, path] => {
            let method = Method::from_bytes(verb.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("invalid HTTP verb {:?}", verb))?;
            Ok((method, path.clone()))
        }
        _ => bail!("expected 1 or 2 arguments: [verb] <path>"),
    }
}

pub async fn run(team: &str, args: &[String], fields: &[String], body: Option<&str>) -> Result<()> {
    let (method, path) = method_and_path(args, body.is_some())?;
    let fields = parse_fields(fields)?;

    if let Some(body) = body {
        serde_json::from_str::<serde_json::Value>(body).context("--body is not valid JSON")?;
    }

    let client = super::connect(team).await?;
    let query: Vec<(&str, String)> = fields.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
    let response = client
        .call(method, &path, &query, body.map(str::as_bytes))
        .await?;

    println!("{}", String::from_utf8_lossy(&response));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_fields() {
        let fields = parse_fields(&strings(&["types=public_channel,im", "q=a=b"])).unwrap();
        assert_eq!(
            fields,
            vec![
                ("types".to_string(), "public_channel,im".to_string()),
                ("q".to_string(), "a=b".to_string()),
            ]
        );
        assert!(parse_fields(&strings(&["limit="])).is_err());
        assert!(parse_fields(&strings(&["limit"])).is_err());
    }

    #[test]
    fn test_method_defaults() {
        let (method, path) = method_and_path(&strings(&["users.list"]), false).unwrap();
        assert_eq!((method, path.as_str()), (Method::GET, "users.list"));

        let (method, _) = method_and_path(&strings(&["chat.postMessage"]), true).unwrap();
        assert_eq!(method, Method::POST);

        let (method, _) = method_and_path(&strings(&["put", "x"]), false).unwrap();
        assert_eq!(method, Method::PUT);

        assert!(method_and_path(&[], false).is_err());
        assert!(method_and_path(&strings(&["a", "b", "c"]), false).is_err());
    }
}
