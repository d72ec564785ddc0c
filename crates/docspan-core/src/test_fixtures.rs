//! Shared test documents.

/// A documentation page with ten headings (depth 2 and 3) after a prelude.
pub const DATABASE_GUIDE: &str = r##"import Layout from '~/layouts/DefaultGuideLayout'

export const meta = {
  id: 'database',
  title: 'Database',
  description: 'Use Supabase to manage your data.',
  sidebar_label: 'Overview',
}

Every Supabase project comes with a full [Postgres](https://www.postgresql.org/) database, a free and open source
database which is considered one of the world's most stable and advanced databases.

## Postgres or PostgreSQL?

PostgreSQL the database was derived from the POSTGRES Project, a package written at the University of California at Berkeley in 1986.
This package included a query language called "PostQUEL".

In 1994, Postgres95 was built on top of POSTGRES code, adding an SQL language interpreter as a replacement for PostQUEL.
Eventually, Postgres95 was renamed to PostgreSQL to reflect the SQL query capability.

## Features

### Table View

You don't have to be a database expert to start using Supabase. Our table view makes Postgres as easy to use as a spreadsheet.

![Table View.](/docs/img/table-view.png)

### Relationships

Dig into the relationships within your data.

<video width="99%" loop="" muted="" playsInline="" controls="true">
  <source src="https://example.com/videos/docs/relational-drilldown-zoom.mp4" type="video/mp4" />
</video>

### Clone tables

You can duplicate your tables, just like you would inside a spreadsheet.

### The SQL Editor

Supabase comes with a SQL Editor. You can also save your favorite queries to run later!

### Additional features

- Supabase extends Postgres with realtime functionality using our [Realtime Server](https://github.com/supabase/realtime).
- Every project is a full Postgres database, with `postgres` level access.
- Supabase manages your database backups.
- Import data directly from a CSV or excel spreadsheet.

### Extensions

To expand the functionality of your Postgres database, you can use extensions.
You can enable Postgres extensions with the click of a button within the Supabase dashboard.

#### Extension catalog

[Learn more](/docs/guides/database/extensions) about all the extensions provided on Supabase.

## Tips

Read about resetting your database password [here](/docs/guides/database/managing-passwords) and changing the timezone of your server [here](/docs/guides/database/managing-timezones).

## Next steps

- Read more about [Postgres](https://www.postgresql.org/about/)
- Sign in: [app.supabase.com](https://app.supabase.com)
"##;
